//! 抽象语法树
//!
//! 直接基于扁平分词数组构建二叉树。逻辑运算符之间没有优先级，
//! 同一括号层级中最左侧的逻辑运算符作为根节点，只有括号可以改变分组。
//! 递归只发生在括号层级上，同层的逻辑运算符链自右向左迭代拼接。

use crate::token::{Token, TokenKind};
use serde::Serialize;

/// 语法树节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AstNode {
    pub kind: TokenKind,
    pub value: String,
    pub left: Option<Box<AstNode>>,
    pub right: Option<Box<AstNode>>,
}

impl AstNode {
    /// 没有子节点的叶子节点
    pub fn leaf(token: &Token) -> Self {
        Self {
            kind: token.kind,
            value: token.value.clone(),
            left: None,
            right: None,
        }
    }

    fn branch(token: &Token, left: Option<AstNode>, right: Option<AstNode>) -> Self {
        Self {
            kind: token.kind,
            value: token.value.clone(),
            left: left.map(Box::new),
            right: right.map(Box::new),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// 树的深度，叶子节点为 1
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            max = max.max(level);
            for child in [&node.left, &node.right].into_iter().flatten() {
                stack.push((&**child, level + 1));
            }
        }
        max
    }
}

// 长运算符链会形成很深的右子树，逐层释放避免栈溢出
impl Drop for AstNode {
    fn drop(&mut self) {
        let mut stack: Vec<Box<AstNode>> = Vec::new();
        stack.extend(self.left.take());
        stack.extend(self.right.take());
        while let Some(mut node) = stack.pop() {
            stack.extend(node.left.take());
            stack.extend(node.right.take());
        }
    }
}

/// 从分词数组构建语法树，数组为空或无法识别时返回 `None`
pub fn build(tokens: &[Token]) -> Option<AstNode> {
    if tokens.is_empty() {
        return None;
    }

    let last = tokens.len() - 1;
    let mut left_bracket: Option<usize> = None;
    let mut depth = 0usize;
    let mut operators: Vec<usize> = Vec::new();
    let mut comparator: Option<usize> = None;

    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftBracket => match left_bracket {
                None => left_bracket = Some(index),
                Some(_) => depth += 1,
            },
            TokenKind::RightBracket => match left_bracket {
                Some(start) if depth == 0 => {
                    // 整个表达式被一对括号包围时，去掉最外层括号
                    if start == 0 && index == last {
                        return build(&tokens[1..last]);
                    }
                    left_bracket = None;
                }
                Some(_) => depth -= 1,
                None => {}
            },
            TokenKind::LogicalOp if left_bracket.is_none() => operators.push(index),
            TokenKind::Comparator if left_bracket.is_none() => comparator = Some(index),
            _ => {}
        }
    }

    // a op1 b op2 c => op1(a, op2(b, c))
    if let Some(&tail) = operators.last() {
        let mut root = build(&tokens[tail + 1..]);
        for (i, &index) in operators.iter().enumerate().rev() {
            let start = if i == 0 { 0 } else { operators[i - 1] + 1 };
            root = Some(AstNode::branch(&tokens[index], build(&tokens[start..index]), root));
        }
        return root;
    }

    comparator.map(|index| {
        let identity = index.checked_sub(1).and_then(|i| tokens.get(i));
        let literal = tokens.get(index + 1);
        AstNode::branch(
            &tokens[index],
            identity.map(AstNode::leaf),
            literal.map(AstNode::leaf),
        )
    })
}

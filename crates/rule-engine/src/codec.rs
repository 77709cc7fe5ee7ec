//! 规则树的规范化 JSON 表示
//!
//! 与存储层约定的节点形态：
//!
//! ```json
//! {"type": "operator", "value": "AND", "left": {...}, "right": {...}}
//! {"type": "operand", "value": "age > 30", "left": null, "right": null}
//! ```
//!
//! 解码时严格校验结构，残缺的树在进入求值器之前即被拒绝。

use crate::error::ValidationError;
use crate::models::RuleNode;
use crate::operators::LogicalOperator;
use crate::parser::parse_condition;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};

const TYPE_OPERATOR: &str = "operator";
const TYPE_OPERAND: &str = "operand";

/// 编码为规范化结构
pub fn encode(node: &RuleNode) -> Value {
    match node {
        RuleNode::Operand(cond) => json!({
            "type": TYPE_OPERAND,
            "left": Value::Null,
            "right": Value::Null,
            "value": cond.to_string(),
        }),
        RuleNode::Connective {
            operator,
            left,
            right,
        } => json!({
            "type": TYPE_OPERATOR,
            "left": encode(left),
            "right": encode(right),
            "value": operator.keyword(),
        }),
    }
}

/// 从规范化结构解码
pub fn decode(value: &Value) -> Result<RuleNode, ValidationError> {
    decode_node(value, "root")
}

pub fn to_json(node: &RuleNode) -> String {
    encode(node).to_string()
}

/// 从 JSON 字符串解码，语法错误与结构错误均报告为校验错误
pub fn from_json(json: &str) -> Result<RuleNode, ValidationError> {
    let value: Value = serde_json::from_str(json).map_err(|e| ValidationError::MalformedNode {
        path: "root".to_string(),
        reason: format!("无效的 JSON: {}", e),
    })?;
    decode(&value)
}

fn decode_node(value: &Value, path: &str) -> Result<RuleNode, ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedNode {
        path: path.to_string(),
        reason,
    };

    let obj = value
        .as_object()
        .ok_or_else(|| malformed(format!("期望对象，实际为 {}", type_name(value))))?;

    let node_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("缺少 type 字段".to_string()))?;

    let node_value = obj
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("缺少字符串类型的 value 字段".to_string()))?;

    match node_type {
        TYPE_OPERATOR => {
            let operator = LogicalOperator::from_keyword(node_value)
                .ok_or_else(|| malformed(format!("未知的逻辑连接词 '{}'", node_value)))?;
            let left = child(obj, "left")
                .ok_or_else(|| malformed("操作符节点缺少 left 子树".to_string()))?;
            let right = child(obj, "right")
                .ok_or_else(|| malformed("操作符节点缺少 right 子树".to_string()))?;

            let left = decode_node(left, &format!("{}.left", path))?;
            let right = decode_node(right, &format!("{}.right", path))?;
            Ok(RuleNode::connective(operator, left, right))
        }
        TYPE_OPERAND => {
            if child(obj, "left").is_some() || child(obj, "right").is_some() {
                return Err(malformed("条件节点不能包含子树".to_string()));
            }
            let condition = parse_condition(node_value)
                .map_err(|e| malformed(format!("条件 '{}' 无效: {}", node_value, e)))?;
            Ok(RuleNode::Operand(condition))
        }
        other => Err(malformed(format!("未知的节点类型 '{}'", other))),
    }
}

/// 取子树，`null` 与缺失等同
fn child<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Serialize for RuleNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        decode(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::compile;

    #[test]
    fn test_encode_shape() {
        let tree = compile("age > 30 AND department = 'Sales'").unwrap();
        assert_eq!(
            encode(&tree),
            json!({
                "type": "operator",
                "value": "AND",
                "left": {"type": "operand", "value": "age > 30", "left": null, "right": null},
                "right": {"type": "operand", "value": "department = 'Sales'", "left": null, "right": null}
            })
        );
    }

    #[test]
    fn test_round_trip() {
        for text in [
            "age > 30",
            "a > 1 OR b > 2 AND c > 3",
            "((age > 30 AND department = 'Sales') OR (age < 25 AND department = 'Marketing')) AND (salary > 50000 OR experience > 5)",
            "city = 'New York' OR city = 'Los Angeles'",
        ] {
            let tree = compile(text).unwrap();
            assert_eq!(decode(&encode(&tree)).unwrap(), tree, "round trip of {}", text);
            assert_eq!(from_json(&to_json(&tree)).unwrap(), tree);
        }
    }

    #[test]
    fn test_round_trip_of_constructed_trees() {
        use crate::models::{Condition, Literal};
        use crate::operators::Comparator;

        let operand = |field: &str, comparator, literal| {
            RuleNode::operand(Condition::new(field, comparator, literal).unwrap())
        };

        let tree = RuleNode::or(
            RuleNode::and(
                operand("name", Comparator::Eq, Literal::quoted("O Brien (Jr)").unwrap()),
                operand("note", Comparator::Eq, Literal::quoted("").unwrap()),
            ),
            RuleNode::or(
                operand("a'b", Comparator::Eq, Literal::bare("x=y").unwrap()),
                operand("score", Comparator::Lt, Literal::quoted("AND").unwrap()),
            ),
        );
        assert_eq!(decode(&encode(&tree)).unwrap(), tree);

        let bare = operand("code", Comparator::Eq, Literal::bare("007").unwrap());
        let quoted = operand("code", Comparator::Eq, Literal::quoted("007").unwrap());
        assert_eq!(decode(&encode(&bare)).unwrap(), bare);
        assert_eq!(decode(&encode(&quoted)).unwrap(), quoted);
        assert_ne!(bare, quoted);
    }

    #[test]
    fn test_constructors_reject_unencodable_parts() {
        use crate::models::{Condition, Literal};
        use crate::operators::Comparator;

        assert_eq!(
            Literal::quoted("O'Brien"),
            Err(ValidationError::InvalidLiteral("O'Brien".to_string()))
        );
        for text in ["", "AND", "=", "'x'", "New York", "(x)"] {
            assert!(Literal::bare(text).is_err(), "{:?}", text);
        }

        let literal = Literal::quoted("x").unwrap();
        assert_eq!(
            Condition::new("first name", Comparator::Eq, literal.clone()),
            Err(ValidationError::InvalidField("first name".to_string()))
        );
        assert!(Condition::new("OR", Comparator::Eq, literal.clone()).is_err());
        assert!(Condition::new("", Comparator::Eq, literal).is_err());
    }

    #[test]
    fn test_decode_accepts_missing_child_keys_on_operand() {
        let tree = decode(&json!({"type": "operand", "value": "age > 30"})).unwrap();
        assert_eq!(tree, compile("age > 30").unwrap());
    }

    #[test]
    fn test_decode_ignores_extra_keys() {
        let tree = decode(&json!({
            "_id": "64f1",
            "type": "operand",
            "value": "age > 30",
            "left": null,
            "right": null
        }))
        .unwrap();
        assert!(tree.is_operand());
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let err = decode(&json!({"type": "leaf", "value": "age > 30"})).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedNode { ref path, .. } if path == "root"));
    }

    #[test]
    fn test_decode_rejects_missing_child() {
        let err = decode(&json!({
            "type": "operator",
            "value": "OR",
            "left": {"type": "operand", "value": "age > 30"},
            "right": null
        }))
        .unwrap_err();
        assert!(err.to_string().contains("right"));
    }

    #[test]
    fn test_decode_rejects_operand_with_children() {
        let leaf = json!({"type": "operand", "value": "a > 1"});
        let err = decode(&json!({
            "type": "operand",
            "value": "age > 30",
            "left": leaf.clone(),
            "right": leaf
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::MalformedNode { .. }));
    }

    #[test]
    fn test_decode_reports_nested_path() {
        let err = decode(&json!({
            "type": "operator",
            "value": "AND",
            "left": {"type": "operand", "value": "age > 30"},
            "right": {
                "type": "operator",
                "value": "OR",
                "left": {"type": "operand", "value": "salary >"},
                "right": {"type": "operand", "value": "x = 1"}
            }
        }))
        .unwrap_err();
        assert!(
            matches!(err, ValidationError::MalformedNode { ref path, .. } if path == "root.right.left")
        );
    }

    #[test]
    fn test_decode_rejects_bad_connective_and_value() {
        assert!(decode(&json!({"type": "operator", "value": "XOR"})).is_err());
        assert!(decode(&json!({"type": "operand", "value": 42})).is_err());
        assert!(decode(&json!({"type": "operand", "value": "a > 1 AND b > 2"})).is_err());
        assert!(decode(&json!("age > 30")).is_err());
        assert!(from_json("{not json").is_err());
    }

    #[test]
    fn test_serde_through_canonical_form() {
        let tree = compile("age > 30 OR name = 'Ada'").unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json, encode(&tree));

        let parsed: RuleNode = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, tree);

        let bad: Result<RuleNode, _> = serde_json::from_value(json!({"type": "operator"}));
        assert!(bad.is_err());
    }
}

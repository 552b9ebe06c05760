use serde_json::Value;

use crate::assertion::extractor::{ParsedBody, extract_value};
use crate::assertion::types::{AssertError, Assertion, AssertionResult, Operator};
use crate::model::TransportResponse;

/// 比较用的操作数
///
/// 宽松相等（equals / notEquals）按下表转换，而不是依赖任何语言的隐式转换：
///
/// | 左 \ 右          | undefined/null | number            | string            | bool             |
/// |------------------|----------------|-------------------|-------------------|------------------|
/// | undefined/null   | true           | false             | false             | false            |
/// | number           | false          | a == b            | a == num(b)       | a == num(b)      |
/// | string           | false          | num(a) == b       | a == b            | num(a) == num(b) |
/// | bool             | false          | num(a) == b       | num(a) == num(b)  | a == b           |
///
/// 数组、对象先转为文本（数组以逗号连接元素，对象为 `[object Object]`）再按 string 比较；
/// 两个复合值之间永远不相等。num() 对空串得 0，无法解析得 NaN，NaN 与任何值都不相等。
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Composite(String),
}

impl Operand {
    fn from_actual(value: Option<&Value>) -> Self {
        match value {
            None => Operand::Undefined,
            Some(Value::Null) => Operand::Null,
            Some(Value::Bool(b)) => Operand::Bool(*b),
            Some(Value::Number(n)) => Operand::Number(n.as_f64().unwrap_or(f64::NAN)),
            Some(Value::String(s)) => Operand::Text(s.clone()),
            Some(composite) => Operand::Composite(primitive_text(composite)),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Operand::Undefined => f64::NAN,
            Operand::Null => 0.0,
            Operand::Bool(b) => f64::from(u8::from(*b)),
            Operand::Number(n) => *n,
            Operand::Text(s) | Operand::Composite(s) => text_to_number(s),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Operand::Undefined => "undefined",
            Operand::Null => "null",
            Operand::Bool(_) => "boolean",
            Operand::Number(_) => "number",
            Operand::Text(_) => "string",
            Operand::Composite(_) => "object",
        }
    }
}

/// 宽松相等
fn loose_equals(left: &Operand, right: &Operand) -> bool {
    use Operand::*;

    match (left, right) {
        (Undefined | Null, Undefined | Null) => true,
        (Undefined | Null, _) | (_, Undefined | Null) => false,
        (Number(a), Number(b)) => a == b,
        (Text(a), Text(b)) => a == b,
        (Bool(a), Bool(b)) => a == b,
        (Number(n), Text(s)) | (Text(s), Number(n)) => *n == text_to_number(s),
        (Bool(b), other) | (other, Bool(b)) => {
            loose_equals(&Number(f64::from(u8::from(*b))), other)
        }
        (Composite(_), Composite(_)) => false,
        (Composite(text), other) | (other, Composite(text)) => {
            loose_equals(&Text(text.clone()), other)
        }
    }
}

/// 字符串转数字，规则与 JSON 数字文本一致，另外接受首尾空白、空串(=0)、
/// Infinity 以及 0x/0o/0b 前缀
fn text_to_number(text: &str) -> f64 {
    let t = text.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)]
        .iter()
        .find_map(|(prefix, radix)| t.strip_prefix(prefix).map(|digits| (digits, *radix)));
    if let Some((digits, radix)) = radix {
        return u64::from_str_radix(digits, radix)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }

    let looks_numeric = t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && t.chars().any(|c| c.is_ascii_digit());
    if !looks_numeric {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// 数组/对象的文本形式
fn primitive_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(primitive_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn number_text(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// 期望值：数值型来源转换为数字，其余保持字符串
fn expected_operand(assertion: &Assertion) -> (Operand, Value) {
    if assertion.source.is_numeric() {
        let n = text_to_number(&assertion.value);
        let shown = serde_json::Number::from_f64(n)
            .map(|num| {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Value::from(n as i64)
                } else {
                    Value::Number(num)
                }
            })
            .unwrap_or_else(|| Value::String(assertion.value.clone()));
        (Operand::Number(n), shown)
    } else {
        (
            Operand::Text(assertion.value.clone()),
            Value::String(assertion.value.clone()),
        )
    }
}

fn compare(operator: &Operator, actual: &Operand, expected: &Operand) -> Result<bool, AssertError> {
    Ok(match operator {
        Operator::Equals => loose_equals(actual, expected),
        Operator::NotEquals => !loose_equals(actual, expected),
        Operator::Contains | Operator::NotContains => match (actual, expected) {
            (Operand::Text(a), Operand::Text(b)) => {
                a.contains(b.as_str()) == (*operator == Operator::Contains)
            }
            _ => {
                return Err(AssertError::TypeMismatch {
                    operator: operator.clone(),
                    actual: actual.type_name().to_string(),
                });
            }
        },
        Operator::GreaterThan => actual.to_number() > expected.to_number(),
        Operator::LessThan => actual.to_number() < expected.to_number(),
        Operator::Exists => *actual != Operand::Undefined,
        Operator::NotExists => *actual == Operand::Undefined,
        Operator::IsNull => *actual == Operand::Null,
        Operator::IsNotNull => *actual != Operand::Null,
        Operator::Unknown(name) => return Err(AssertError::UnknownOperator(name.clone())),
    })
}

/// 执行断言求值
pub fn evaluate_assertion(
    assertion: &Assertion,
    response: &TransportResponse,
    body: &ParsedBody,
) -> AssertionResult {
    let id = assertion.id.clone();
    let (expected, expected_value) = expected_operand(assertion);

    let actual_value = match extract_value(assertion, response, body) {
        Ok(v) => v,
        Err(e) => return AssertionResult::error(id, Some(expected_value), e),
    };
    let actual = Operand::from_actual(actual_value.as_ref());

    match compare(&assertion.operator, &actual, &expected) {
        Ok(true) => AssertionResult::pass(id, actual_value, Some(expected_value)),
        Ok(false) => AssertionResult::fail(id, actual_value, Some(expected_value)),
        Err(e) => AssertionResult::fail(id, actual_value, Some(expected_value)).with_error(e),
    }
}

/// 断言模块 - 对响应执行声明式断言
mod evaluator;
mod extractor;
mod types;

pub use evaluator::evaluate_assertion;
pub use extractor::{ParsedBody, extract_value};
pub use types::{
    AssertError, Assertion, AssertionResult, AssertionSource, AssertionStatus, Operator,
    TestResult,
};

use crate::model::TransportResponse;

/// 对一个响应执行整批断言
///
/// 跳过未启用的断言，body 只解析一次，结果顺序与输入一致。
/// 单个断言出错只影响它自己的结果。
pub fn run_assertions(
    assertions: &[Assertion],
    response: &TransportResponse,
    raw_body: &str,
) -> TestResult {
    let enabled: Vec<&Assertion> = assertions.iter().filter(|a| a.enabled).collect();
    if enabled.is_empty() {
        return TestResult::default();
    }

    let body = ParsedBody::parse(raw_body);
    let results = enabled
        .into_iter()
        .map(|assertion| evaluate_assertion(assertion, response, &body))
        .collect();

    TestResult::from_results(results)
}

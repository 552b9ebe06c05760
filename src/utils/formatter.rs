use colored::*;

use crate::model::Response;

pub enum ResponseFormat {
    Compact,
    Verbose,
}

pub struct ResponseFormatter {
    format: ResponseFormat,
    color: bool,
}

impl ResponseFormatter {
    pub fn new(format: ResponseFormat) -> Self {
        Self {
            format,
            color: true,
        }
    }

    /// 关闭颜色（测试与管道输出）
    pub fn without_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn format(&self, response: &Response) -> String {
        let mut output = vec![self.status_line(response), self.timing_line(response)];

        if let ResponseFormat::Verbose = self.format {
            output.push(String::new());
            output.push(self.paint_heading("Headers:"));
            for header in &response.headers {
                let line = format!("   {}: {}", header.name, header.value);
                output.push(if self.color { line.blue().to_string() } else { line });
            }
        }

        let body = &response.body;
        match self.format {
            ResponseFormat::Compact if !body.is_empty() && body.len() < 200 => {
                output.push(try_format_json(body).unwrap_or_else(|| body.to_string()));
            }
            ResponseFormat::Compact if !body.is_empty() => {
                output.push(format!("Body: {} bytes", body.len()));
            }
            ResponseFormat::Verbose if !body.is_empty() => {
                output.push(String::new());
                output.push(self.paint_heading("Body:"));
                output.push(try_format_json(body).unwrap_or_else(|| body.to_string()));
            }
            _ => {}
        }

        output.join("\n")
    }

    fn status_line(&self, response: &Response) -> String {
        let line = if response.is_network_failure() {
            format!("Network failure: {}", response.status_message)
        } else {
            format!("HTTP {} {}", response.status_code, response.status_message)
        };

        if !self.color {
            return line;
        }
        let colored = if response.is_success() {
            line.green()
        } else if response.is_client_error() {
            line.yellow()
        } else {
            line.red()
        };
        match self.format {
            ResponseFormat::Verbose => colored.bold().to_string(),
            ResponseFormat::Compact => colored.to_string(),
        }
    }

    fn timing_line(&self, response: &Response) -> String {
        let timing = format!("Time: {}ms", response.elapsed_time);
        if self.color {
            timing.cyan().to_string()
        } else {
            timing
        }
    }

    fn paint_heading(&self, heading: &str) -> String {
        if self.color {
            heading.blue().bold().to_string()
        } else {
            heading.to_string()
        }
    }
}

/// 尝试将 body 格式化为漂亮的 JSON
fn try_format_json(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

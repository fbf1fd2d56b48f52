//! String template rendering utilities.

pub struct TemplateVars;

impl TemplateVars {
    pub const JOB_NAME: &'static str = "jobName";
    pub const LOG_PREFIX: &'static str = "logPrefix";
    pub const JOB_ID: &'static str = "jobId";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

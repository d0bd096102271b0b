use super::ToolRuntime;

impl ToolRuntime {
    /// Static instruction block sent with every prompt: the numbered tool
    /// catalogue plus the response-format rules.
    pub(crate) fn compose_system_instructions(&self) -> String {
        let mut lines = vec![
            "You are a reasoning agent that solves problems step by step.".to_string(),
            "Available tools:".to_string(),
        ];

        for (position, tool) in self.descriptors().iter().enumerate() {
            let rendered_params = if tool.parameters.is_empty() {
                "no parameters".to_string()
            } else {
                tool.parameters
                    .iter()
                    .map(|param| format!("{}: {}", param.name, param.kind.label()))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            lines.push(format!(
                "{}. {}({}) - {}",
                position + 1,
                tool.name,
                rendered_params,
                tool.description.as_deref().unwrap_or("No description available"),
            ));
        }

        lines.push(String::new());
        lines.push(
            "Before solving, identify the reasoning type of each step (arithmetic, logic, \
             lookup, planning) and work through the steps one at a time."
                .to_string(),
        );
        lines.push(
            "Verify intermediate results before moving on, and process every value a \
             function returns."
                .to_string(),
        );
        lines.push(
            "Call exactly one function per response and never repeat a call with identical \
             parameters."
                .to_string(),
        );
        lines.push("Only give FINAL_ANSWER once all necessary calculations are complete.".to_string());
        lines.push(
            "If no tool covers the request, answer that you do not have the capability for it."
                .to_string(),
        );
        lines.push(String::new());
        lines.push("Respond with EXACTLY ONE line in one of these formats:".to_string());
        lines.push(
            r#"1. {"message_type": "FUNCTION_CALL", "name": "function_name", "params": {"param1": value1, "param2": value2}}"#
                .to_string(),
        );
        lines.push(r#"2. {"message_type": "FINAL_ANSWER", "params": "answer"}"#.to_string());

        lines.join("\n")
    }
}

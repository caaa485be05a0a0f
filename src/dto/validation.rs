//! Custom validators shared by the request payloads.

use validator::ValidationError;

/// Validates that a topic is non-empty once surrounding whitespace is trimmed.
pub fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.trim().is_empty() {
        let mut err = ValidationError::new("topic_empty");
        err.message = Some("topic must not be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Validates an answer option list: at least two options, none blank.
pub fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.len() < 2 {
        let mut err = ValidationError::new("options_too_few");
        err.message =
            Some(format!("a question needs at least 2 options (got {})", options.len()).into());
        return Err(err);
    }

    if options.iter().any(|option| option.trim().is_empty()) {
        let mut err = ValidationError::new("options_blank");
        err.message = Some("answer options must not be blank".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that the correct-option index points inside the option list.
pub fn validate_correct_index(index: usize, options: &[String]) -> Result<(), ValidationError> {
    if index >= options.len() {
        let mut err = ValidationError::new("correct_index_out_of_range");
        err.message = Some(
            format!(
                "correct option index {index} is out of range for {} options",
                options.len()
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

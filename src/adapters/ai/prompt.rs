//! Prompt construction and answer post-processing for LLM drafts.

use crate::domain::consultation::PatientContext;
use crate::ports::FinishReason;

const UNKNOWN: &str = "unknown";

/// Line prefixes that mark a cited reference in a model answer.
const REFERENCE_PREFIXES: [&str; 5] = ["ref:", "reference:", "[", "1.", "2."];

/// System prompt grounding the model in the patient's context.
pub fn system_prompt(context: &PatientContext) -> String {
    let age = context
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let gender = context.gender.as_deref().unwrap_or(UNKNOWN);
    let history = if context.medical_history.is_empty() {
        "none recorded".to_string()
    } else {
        context.medical_history.join(", ")
    };

    format!(
        "You are a medical AI assistant helping medical professionals such as doctors, nurses, \
         and caregiving professionals to draft answers for medical and caregiving related \
         questions. Provide accurate medical information based on the following patient context:\n\
         \n\
         Patient Information:\n\
         - Age: {age}\n\
         - Gender: {gender}\n\
         - Medical History: {history}\n\
         \n\
         Recent Biometric Data:\n\
         {biometrics}\n\
         \n\
         Recent Chat History:\n\
         {chat}\n\
         \n\
         Provide a clear, professional response that a medical professional can review.",
        age = age,
        gender = gender,
        history = history,
        biometrics = bullet_list(
            context
                .biometrics
                .iter()
                .map(|(name, value)| format!("{}: {}", name, value))
        ),
        chat = bullet_list(context.chat_history.iter().cloned()),
    )
}

/// User turn carrying the patient's question.
pub fn user_prompt(question: &str) -> String {
    format!(
        "Question: {}\n\nPlease provide a detailed medical response, including any relevant references.",
        question
    )
}

/// Confidence implied by how the model stopped.
pub fn confidence_for(finish_reason: FinishReason) -> f64 {
    match finish_reason {
        FinishReason::Stop => 0.95,
        _ => 0.5,
    }
}

/// Lines of `answer` that cite a reference, trimmed.
pub fn extract_references(answer: &str) -> Vec<String> {
    answer
        .lines()
        .map(str::trim)
        .filter(|line| REFERENCE_PREFIXES.iter().any(|p| line.starts_with(p)))
        .map(str::to_string)
        .collect()
}

fn bullet_list(items: impl Iterator<Item = String>) -> String {
    let lines: Vec<String> = items.map(|item| format!("- {}", item)).collect();
    if lines.is_empty() {
        "- none".to_string()
    } else {
        lines.join("\n")
    }
}

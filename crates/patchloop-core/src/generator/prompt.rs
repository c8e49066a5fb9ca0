//! Instruction text for the three generation tasks.

use crate::ledger::ErrorRecord;
use crate::memory::MemorySnapshot;

use super::GenerationRequest;

/// Create a new file from a user prompt.
pub fn write_instruction(user_prompt: &str) -> String {
    format!(
        "You are a helpful AI developer assistant.\n\n\
         Generate a source file for the following instruction:\n\n\
         \"{}\"\n\n\
         Guidelines:\n\
         - Write clean, modular code.\n\
         - Reuse what the memory summary says already exists.\n\
         - Output only code. No explanation.\n",
        user_prompt.trim()
    )
}

/// Edit an existing file.
pub fn update_instruction(instruction: &str, existing_code: &str) -> String {
    format!(
        "You are an expert code editor AI.\n\n\
         Update the file below according to the instruction.\n\n\
         Instruction:\n\"{}\"\n\n\
         Only modify what is necessary. Return the complete file, code only.\n\n\
         --- EXISTING CODE ---\n{}\n",
        instruction.trim(),
        existing_code
    )
}

/// Fix a file using its latest ledger record.
pub fn repair_instruction(fix_instruction: &str, record: &ErrorRecord, code: &str) -> String {
    format!(
        "You are a professional AI code debugger.\n\n\
         {}\n\
         Fix the file {} based on the error below.\n\n\
         --- ORIGINAL CODE ---\n{}\n\n\
         --- ERROR TRACEBACK ---\n{}\n\n\
         --- ERROR MESSAGE ---\n{}\n\n\
         Return the complete updated code ONLY.\n",
        fix_instruction.trim(),
        record.filepath,
        code,
        record.traceback,
        record.error_message
    )
}

/// Pretty JSON of the memory snapshot; `{}` when empty.
pub fn render_memory(context: &MemorySnapshot) -> String {
    serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string())
}

/// Final prompt text sent to a model.
pub fn render_prompt(request: &GenerationRequest) -> String {
    format!(
        "{}\n--- MEMORY (for context) ---\n{}\n",
        request.instruction.trim_end(),
        render_memory(&request.context)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_key::FileKey;
    use crate::memory::MemoryEntry;

    #[test]
    fn test_repair_instruction_carries_record() {
        let record = ErrorRecord {
            filepath: FileKey::new("bad.py"),
            error_message: "ZeroDivisionError: division by zero".to_string(),
            traceback: "Traceback (most recent call last):\n  line 1".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let text = repair_instruction("Fix all bugs and errors.", &record, "print(1/0)");
        assert!(text.contains("Fix all bugs and errors."));
        assert!(text.contains("print(1/0)"));
        assert!(text.contains("ZeroDivisionError: division by zero"));
        assert!(text.contains("Traceback (most recent call last)"));
        assert!(text.contains("bad.py"));
    }

    #[test]
    fn test_render_prompt_includes_memory() {
        let mut context = MemorySnapshot::new();
        let mut entry = MemoryEntry::default();
        entry.functions.insert("helper".to_string());
        context.insert(FileKey::new("util.py"), entry);

        let prompt = render_prompt(&GenerationRequest::new(write_instruction("a cli"), context));
        assert!(prompt.contains("\"a cli\""));
        assert!(prompt.contains("\"util.py\""));
        assert!(prompt.contains("helper"));
    }

    #[test]
    fn test_empty_memory_renders_braces() {
        assert_eq!(render_memory(&MemorySnapshot::new()), "{}");
    }
}

//! 系统提示词：从 prompts 目录读取，缺失时使用内置默认值

use std::path::Path;

pub const SUPERVISOR_PROMPT_FILE: &str = "supervisor_agent_prompt.md";
pub const DOCUMENTS_PROMPT_FILE: &str = "confluence_agent_prompt.md";
pub const NOTES_PROMPT_FILE: &str = "obsidian_agent_prompt.md";

const DEFAULT_SUPERVISOR: &str = "You are a knowledge assistant. Answer directly when no lookup is needed. \
Use search_confluence for team documentation and manage_obsidian_notes for the user's personal notes, \
passing a precise task in the `request` argument. Report failures honestly.";

const DEFAULT_DOCUMENTS: &str = "You search Confluence documentation with the available tools \
and answer with the pages you found. Say so when nothing relevant exists.";

const DEFAULT_NOTES: &str = "You manage the user's Obsidian notes with the available tools. \
Read a note before changing it and report exactly what you changed.";

/// 三个智能体的系统提示词
#[derive(Debug, Clone)]
pub struct Prompts {
    pub supervisor: String,
    pub documents: String,
    pub notes: String,
}

impl Prompts {
    pub fn load(dir: &Path) -> Self {
        Self {
            supervisor: load_or_default(dir, SUPERVISOR_PROMPT_FILE, DEFAULT_SUPERVISOR),
            documents: load_or_default(dir, DOCUMENTS_PROMPT_FILE, DEFAULT_DOCUMENTS),
            notes: load_or_default(dir, NOTES_PROMPT_FILE, DEFAULT_NOTES),
        }
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            supervisor: DEFAULT_SUPERVISOR.to_string(),
            documents: DEFAULT_DOCUMENTS.to_string(),
            notes: DEFAULT_NOTES.to_string(),
        }
    }
}

fn load_or_default(dir: &Path, file: &str, default: &str) -> String {
    match std::fs::read_to_string(dir.join(file)) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => {
            tracing::debug!(prompt = file, dir = %dir.display(), "prompt file missing, using built-in default");
            default.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_prefers_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SUPERVISOR_PROMPT_FILE), "custom supervisor").unwrap();
        let prompts = Prompts::load(dir.path());
        assert_eq!(prompts.supervisor, "custom supervisor");
        assert_eq!(prompts.documents, DEFAULT_DOCUMENTS);
        assert_eq!(prompts.notes, DEFAULT_NOTES);
    }

    #[test]
    fn test_empty_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(NOTES_PROMPT_FILE), "  \n").unwrap();
        assert_eq!(Prompts::load(dir.path()).notes, DEFAULT_NOTES);
    }
}

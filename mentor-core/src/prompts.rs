//! Prompt construction for the mentor workflows

use askama::Template;

/// System instruction for every mentor conversation
pub const MENTOR_SYSTEM_PROMPT: &str = "\
You are a senior software engineer mentoring a junior developer who is fixing their first open source issue.
Your job is to teach, not to solve.
1. Never hand over the solution code.
2. Give short, high-level guidance grounded in the issue and code you are shown.
3. When asked for the answer outright, reply with a subtle hint instead (for example \"Look at the comparison on line 12\" or \"Is that variable in scope here?\").
4. Stay professional and encouraging.";

/// Upper bound on repository paths sent to the file finder
pub const MAX_REPOSITORY_FILES: usize = 600;

/// Issue bodies longer than this many characters are cut
pub const MAX_ISSUE_BODY_CHARS: usize = 2000;

const NO_FILES_PLACEHOLDER: &str =
    "(The file list is unavailable. Guess from common project conventions.)";

const IGNORED_PATH_FRAGMENTS: &[&str] = &["node_modules", ".git/", "package-lock.json", "yarn.lock"];
const IGNORED_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".pdf"];

#[derive(Template)]
#[template(path = "mentor_hint.txt")]
struct MentorHintTemplate<'a> {
    issue: &'a str,
    code: &'a str,
    user_message: &'a str,
}

#[derive(Template)]
#[template(path = "chat_context.txt")]
struct ChatContextTemplate<'a> {
    system_prompt: &'a str,
    issue: Option<&'a str>,
    code: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "file_finder.txt")]
struct FileFinderTemplate<'a> {
    owner: &'a str,
    repo: &'a str,
    issue_title: &'a str,
    issue_body: &'a str,
    file_list: &'a str,
}

/// User prompt for a one-shot hint about `issue` given the developer's code
pub fn mentor_hint_prompt(
    issue: &str,
    code: &str,
    user_message: &str,
) -> Result<String, askama::Error> {
    MentorHintTemplate {
        issue,
        code,
        user_message,
    }
    .render()
}

/// Mentor system instruction extended with whatever issue and code context
/// the chat has. Blank values are left out.
pub fn chat_system_instruction(
    issue: Option<&str>,
    code: Option<&str>,
) -> Result<String, askama::Error> {
    ChatContextTemplate {
        system_prompt: MENTOR_SYSTEM_PROMPT,
        issue: issue.filter(|s| !s.trim().is_empty()),
        code: code.filter(|s| !s.trim().is_empty()),
    }
    .render()
}

/// Prompt asking which file of `owner/repo` most likely needs the fix.
/// `files` should already be filtered with [`filter_repository_files`].
pub fn file_finder_prompt(
    owner: &str,
    repo: &str,
    issue_title: &str,
    issue_body: &str,
    files: &[String],
) -> Result<String, askama::Error> {
    let file_list = if files.is_empty() {
        NO_FILES_PLACEHOLDER.to_string()
    } else {
        files.join("\n")
    };
    let issue_body = truncate_chars(issue_body, MAX_ISSUE_BODY_CHARS);

    FileFinderTemplate {
        owner,
        repo,
        issue_title,
        issue_body,
        file_list: &file_list,
    }
    .render()
}

/// Drop dependency folders, VCS internals, lock files and binary assets,
/// keeping at most [`MAX_REPOSITORY_FILES`] paths in their original order.
pub fn filter_repository_files<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths
        .into_iter()
        .filter(|path| is_relevant_path(path.as_ref()))
        .take(MAX_REPOSITORY_FILES)
        .map(|path| path.as_ref().to_string())
        .collect()
}

fn is_relevant_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    if IGNORED_PATH_FRAGMENTS.iter().any(|frag| path.contains(frag)) {
        return false;
    }
    !IGNORED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Strip the markdown and quoting models like to wrap a bare path in
pub fn clean_predicted_path(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '`' | '\'' | '"'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

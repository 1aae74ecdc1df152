//! Messages sent to the generation agent.

use super::files::{CANDIDATE_PATH, SCHEMA_PATH, TEST_HARNESS_PATH};
use crate::types::Verdict;

/// Phrase every corrective message for an empty result carries.
pub const EMPTY_RESULT_REJECTION: &str = "An empty result is NOT acceptable";

/// First message of a session: the user's goal plus extraction guidance.
pub fn task_prompt(goal: &str) -> String {
    format!(
        r#"Implement `getData(input)` in {CANDIDATE_PATH}.

## Goal
{goal}

## What you have
- logs/log-*.json: the network responses recorded while the page loaded, in the order they arrived. Each file has `url`, `method`, `resourceType`, `status` and, when it was readable, `body`.
- {SCHEMA_PATH}: the input schema, the output schema `getData` must satisfy, and the example input the test uses.
- {TEST_HARNESS_PATH}: the test that will run your function. Do not edit it or anything under logs/.

## How to find the data
1. Look for JSON API responses first (resourceType `fetch` or `xhr`, JSON bodies). If one holds the data, have `getData` call that endpoint with `fetch` and map the response.
2. Only if no API carries it, parse the HTML document. Check embedded state before scraping markup: `__NEXT_DATA__`, `__NUXT__`, `window.__INITIAL_STATE__`, `application/ld+json` blocks and `data-*` attributes holding JSON.
3. Before writing a property path, write out the structure of the object you are reading. Data you expect under one key often sits in a sibling. For example, `hosts` may be a sibling of `event` (`data.hosts`), not a child of it (`data.event.hosts`).
4. Build request URLs from `input` and from values present in the logs.

## Rules
- Never invent URLs, query parameters or field names. Every one must appear in the logs.
- Never return an empty array or object unless you have proved the data is absent. Empty output fails the test.
- Log what you read with `console.log`: the URL you fetch, the response status, `Object.keys(...)` of every object on the path to the data, and the length of the final result.
- Return plain JSON-serialisable values that match the output schema exactly.
- Keep the signature `export async function getData(input)`."#
    )
}

/// Follow-up message after a failed attempt.
pub fn correction_message(verdict: Verdict, diagnostic: &str) -> String {
    let mut msg = match verdict {
        Verdict::FailEmpty => format!(
            "The test passed but returned an EMPTY result:\n{diagnostic}\n\n\
             {EMPTY_RESULT_REJECTION}. The data exists in the logs. Find where it is.\n\
             - Log `Object.keys(...)` of the parent object and of every object on the path to the data.\n\
             - Check whether the data is a sibling of the key you read rather than a child of it.\n\
             - Search the logs for a concrete value you expect in the output and follow it back to its parent.\n"
        ),
        _ => format!(
            "The test failed:\n{diagnostic}\n\nFix the error and try again.\n"
        ),
    };
    msg.push_str(
        "\nCheck your console.log output above and make sure you are reading the right properties.",
    );
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_prompt_carries_goal_and_rules() {
        let p = task_prompt("Get the event hosts with their names and photos");
        assert!(p.contains("Get the event hosts with their names and photos"));
        assert!(p.contains("JSON API responses first"));
        assert!(p.contains("sibling"));
        assert!(p.contains("Never invent URLs"));
        assert!(p.contains("Never return an empty array"));
        assert!(p.contains(CANDIDATE_PATH));
    }

    #[test]
    fn test_empty_correction_demands_key_logging() {
        let m = correction_message(Verdict::FailEmpty, "Result: []");
        assert!(m.contains(EMPTY_RESULT_REJECTION));
        assert!(m.contains("Result: []"));
        assert!(m.contains("Object.keys"));
    }

    #[test]
    fn test_error_correction_quotes_diagnostic() {
        let m = correction_message(Verdict::FailError, "Error: boom");
        assert!(m.contains("Error: boom"));
        assert!(m.contains("Fix the error"));
        assert!(!m.contains(EMPTY_RESULT_REJECTION));
    }
}

//! Virtual files shown to the generation agent.

use crate::agent::VirtualFile;
use crate::types::{SchemaSpec, Transcript};

/// Path of the candidate the agent implements.
pub const CANDIDATE_PATH: &str = "scripts/get-data.js";
pub const TEST_HARNESS_PATH: &str = "tests/get-data.test.js";
pub const SCHEMA_PATH: &str = "lib/schema.txt";
pub const PACKAGE_PATH: &str = "package.json";

/// Initial, unimplemented candidate.
pub const CANDIDATE_STUB: &str = r#"export async function getData(input) {
  try {
    // write logic here
    // return data
    return [];
  } catch (error) {
    console.error("Error fetching data:", error);
    throw error;
  }
}
"#;

/// Tested in place of a candidate when the agent produced none.
pub const PLACEHOLDER_CANDIDATE: &str = r#"// No script generated
export async function getData(input) {
  return [];
}
"#;

const PACKAGE_JSON: &str = r#"{
  "name": "get-data-script",
  "type": "module",
  "private": true,
  "scripts": {
    "test": "node --test tests/"
  }
}
"#;

/// Path of the log file for the event at `index`.
pub fn log_path(index: usize) -> String {
    format!("logs/log-{index}.json")
}

/// Assemble the file set for a new generation session.
///
/// One locked log file per transcript event, then the locked package
/// manifest, test harness and schema file, and finally the editable stub.
pub fn build_files(transcript: &Transcript, spec: &SchemaSpec) -> Vec<VirtualFile> {
    let mut files: Vec<VirtualFile> = transcript
        .events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            let content = serde_json::to_string_pretty(event).unwrap_or_default();
            VirtualFile::locked(log_path(i), content)
        })
        .collect();

    files.push(VirtualFile::locked(PACKAGE_PATH, PACKAGE_JSON));
    files.push(VirtualFile::locked(TEST_HARNESS_PATH, test_harness(spec)));
    files.push(VirtualFile::locked(SCHEMA_PATH, schema_file(spec)));
    files.push(VirtualFile::editable(CANDIDATE_PATH, CANDIDATE_STUB));
    files
}

fn test_harness(spec: &SchemaSpec) -> String {
    let schema_comment: String = spec
        .output_schema
        .lines()
        .map(|l| format!("//   {l}\n"))
        .collect();
    format!(
        r#"import {{ test }} from "node:test";
import assert from "node:assert/strict";
import {{ getData }} from "../scripts/get-data.js";

// getData must return a value matching the output schema in lib/schema.txt:
{schema_comment}
test("getData returns schema-valid, non-empty data", async () => {{
  const result = await getData({args});

  console.log("Result:", JSON.stringify(result, null, 2));

  assert.ok(result !== undefined && result !== null, "getData returned nothing");
  if (Array.isArray(result)) {{
    assert.ok(result.length > 0, "getData returned an empty array");
  }}
}});
"#,
        args = spec.example_args.trim(),
    )
}

fn schema_file(spec: &SchemaSpec) -> String {
    format!(
        "# Input schema (shape of the `input` argument)\n{}\n\n\
         # Output schema (shape of the value getData returns)\n{}\n\n\
         # Example input used by the test\n{}\n\n\
         # Notation\n\
         # string, number, integer, boolean, null, any\n\
         # array<T> or T[], record<T> (object with any keys), {{key: T, optional?: T}}\n\
         # \"literal\", A | B, string(1..) = at least one character, array<T>(1..) = at least one item\n\
         # Objects may carry keys beyond the ones listed.\n",
        spec.input_schema.trim(),
        spec.output_schema.trim(),
        spec.example_args.trim(),
    )
}

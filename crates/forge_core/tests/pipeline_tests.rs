//! Integration tests for the parse -> merge -> export pipeline.

use forge_core::{
    apply_pending_steps, file_count, find_node, parse_build_steps, write_to_dir, FileKind,
    StepStatus, StepType,
};
use tempfile::tempdir;
use walkdir::WalkDir;

const REACT_SCAFFOLD: &str = r#"Here is the scaffold you asked for.

<boltArtifact id="project-import" title="Project Files">
  <boltAction type="file" filePath="package.json">{\n  \"name\": \"vite-react\",\n  \"private\": true\n}</boltAction>
  <boltAction type="file" filePath="src/main.tsx">import { StrictMode } from 'react';\nimport App from './App';</boltAction>
  <boltAction type="file" filePath="src/App.tsx">export default function App() {\n\treturn <div className="app">Hello</div>;\n}</boltAction>
  <boltAction type="shell">npm install && npm run dev -- --host 0.0.0.0 --port 5173 --strictPort</boltAction>
</boltArtifact>

Run it and open the preview."#;

#[test]
fn test_scaffold_parses_in_order() {
    let steps = parse_build_steps(REACT_SCAFFOLD);

    let kinds: Vec<StepType> = steps.iter().map(|s| s.step_type).collect();
    assert_eq!(
        kinds,
        vec![
            StepType::CreateFolder,
            StepType::CreateFile,
            StepType::CreateFile,
            StepType::CreateFile,
            StepType::RunScript,
        ]
    );
    assert_eq!(steps[0].title, "Project Files");
    assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
    assert!(steps[4].description.ends_with("..."));
}

#[test]
fn test_scaffold_merges_into_tree() {
    let steps = parse_build_steps(REACT_SCAFFOLD);
    let outcome = apply_pending_steps(&steps, &[]).expect("file steps present");

    assert_eq!(outcome.applied, 3);
    assert_eq!(file_count(&outcome.files), 3);

    let src = find_node(&outcome.files, "/src").unwrap();
    assert_eq!(src.kind, FileKind::Folder);
    assert_eq!(src.children().len(), 2);

    let package = find_node(&outcome.files, "/package.json").unwrap();
    assert!(package.content.as_deref().unwrap().contains("\"private\": true"));

    let app = find_node(&outcome.files, "/src/App.tsx").unwrap();
    assert!(app.content.as_deref().unwrap().contains("\treturn <div className=\"app\">"));

    // A second pass over the completed steps is a no-op
    assert!(apply_pending_steps(&outcome.steps, &outcome.files).is_none());
}

#[test]
fn test_follow_up_batch_overwrites_scaffold_file() {
    let scaffold = parse_build_steps(REACT_SCAFFOLD);
    let first = apply_pending_steps(&scaffold, &[]).unwrap();

    let follow_up = parse_build_steps(
        r#"<boltArtifact title="Todo App"><boltAction type="file" filePath="/src/App.tsx">export default function App() { return null; }</boltAction><boltAction type="file" filePath="src/components/TodoList.tsx">export {}</boltAction></boltArtifact>"#,
    );
    let second = apply_pending_steps(&follow_up, &first.files).unwrap();

    assert_eq!(file_count(&second.files), 4);
    let app = find_node(&second.files, "src/App.tsx").unwrap();
    assert_eq!(
        app.content.as_deref(),
        Some("export default function App() { return null; }")
    );
    assert!(find_node(&second.files, "/src/components/TodoList.tsx").is_some());
}

#[test]
fn test_tree_written_to_disk() {
    let steps = parse_build_steps(REACT_SCAFFOLD);
    let outcome = apply_pending_steps(&steps, &[]).unwrap();

    let dir = tempdir().unwrap();
    let written = write_to_dir(&outcome.files, dir.path()).unwrap();
    assert_eq!(written.len(), 3);

    let on_disk: Vec<String> = WalkDir::new(dir.path())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir.path())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();

    for expected in ["package.json", "src/main.tsx", "src/App.tsx"] {
        assert!(on_disk.iter().any(|p| p == expected), "missing {}", expected);
    }

    let main = std::fs::read_to_string(dir.path().join("src").join("main.tsx")).unwrap();
    assert_eq!(main, "import { StrictMode } from 'react';\nimport App from './App';");
}

//! End to end runs of the `cauldron` binary.

use std::{
    io::Write,
    process::{Command, Output, Stdio},
};

use cauldron_core::challenge::Catalog;

fn cauldron(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cauldron"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("CAULDRON_ISOLATION")
        .output()
        .unwrap()
}

fn source_file(code: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(code.as_bytes()).unwrap();
    file
}

fn stdout(output: &Output) -> String {
    console::strip_ansi_codes(&String::from_utf8_lossy(&output.stdout)).into_owned()
}

#[test]
fn test_run_prints_output() {
    let file = source_file("console.log('hola'); return [1, 2].length;");
    let output = cauldron(&["run", file.path().to_str().unwrap()]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "hola\n→ 2\n");
}

#[test]
fn test_run_in_thread_mode() {
    let file = source_file("console.error('uy');");
    let output = cauldron(&["run", "--isolation", "thread", file.path().to_str().unwrap()]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "uy\n");
}

#[test]
fn test_grading_a_solution_succeeds() {
    let catalog = Catalog::bundled().unwrap();
    let challenge = catalog.get("js-novato-003").unwrap();
    let file = source_file(&challenge.solution);

    let output = cauldron(&["test", file.path().to_str().unwrap(), "--challenge", "js-novato-003"]);
    let text = stdout(&output);

    assert!(output.status.success());
    assert_eq!(text.matches('✓').count(), challenge.tests.len());
    assert!(text.contains("¡Todos los tests pasaron! Reto completado."));
}

#[test]
fn test_grading_starter_code_fails() {
    let file = source_file("function countSouls(text) { return 0; }");
    let output = cauldron(&["test", file.path().to_str().unwrap(), "-c", "js-novato-002"]);

    assert!(!output.status.success());
    assert!(stdout(&output).contains("✗ Esperado: 4, Recibido: 0"));
}

#[test]
fn test_unknown_challenge_is_an_error() {
    let file = source_file("");
    let output = cauldron(&["test", file.path().to_str().unwrap(), "-c", "js-nope-999"]);
    assert!(!output.status.success());
}

#[test]
fn test_challenges_listing() {
    let output = cauldron(&["challenges", "--level", "novato"]);
    let text = stdout(&output);

    assert!(output.status.success());
    assert!(text.contains("Novato"));
    assert!(text.contains("js-novato-001"));
    assert!(!text.contains("js-intermedio-001"));
}

#[test]
fn test_worker_speaks_frames() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_cauldron"))
        .arg("worker")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"console.info('x'); return 1;")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<_> = stdout.lines().collect();

    assert!(output.status.success());
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains(r#""kind":"info""#));
    assert!(lines[1].contains(r#""text":"→ 1""#));
    assert_eq!(lines[2], r#"{"type":"done"}"#);
}

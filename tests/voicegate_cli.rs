use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn voicegate_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_voicegate").expect("voicegate test binary not built")
}

#[test]
fn help_describes_the_capture_flags() {
    let output = Command::new(voicegate_bin())
        .arg("--help")
        .output()
        .expect("run voicegate --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("--auto-stop"));
    assert!(combined.contains("--list-input-devices"));
    assert!(combined.contains("--on-saturate"));
}

#[test]
fn rejects_out_of_range_threshold() {
    let output = Command::new(voicegate_bin())
        .args(["--start-threshold", "nope"])
        .output()
        .expect("run voicegate with a bad flag value");
    assert!(!output.status.success());
}

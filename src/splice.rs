//! Entry-point splicing.
//!
//! Corpus workloads keep a human-runnable demonstration entry point. Runtimes
//! that need a standalone program get the shared driver body instead, either by
//! replacing the entry-point block or by substituting the workload into a
//! driver template at a fixed marker.

use crate::HarnessError;

/// Placeholder in a driver template where the staged workload body goes.
pub const WORKLOAD_MARKER: &str = "/* @@CROSSBENCH_WORKLOAD@@ */";

/// How to recognise a zero-argument entry point and the extent of its body.
#[derive(Clone, Copy, Debug)]
pub struct EntryPoint {
    /// Text an unindented line must contain to open the entry point.
    pub signature: &'static str,
    /// Prefix every body line carries.
    pub body_indent: &'static str,
}

impl EntryPoint {
    pub const MOJO: EntryPoint = EntryPoint {
        signature: "fn main()",
        body_indent: "    ",
    };

    fn opens(&self, line: &str) -> bool {
        let top_level = line.chars().next().is_some_and(|c| !c.is_whitespace());
        top_level && line.contains(self.signature)
    }

    fn continues(&self, line: &str) -> bool {
        line.starts_with(self.body_indent) || line.trim().is_empty()
    }
}

/// Replace the first top-level entry point in `source` with `driver_body`.
///
/// The entry-point line and its indented (or blank) continuation lines are
/// dropped and the driver body is inserted in their place; top-level lines
/// after the block are kept. Without an entry point the driver body is
/// appended. The result carries exactly one copy of `driver_body`.
pub fn replace_entry_point(source: &str, entry: &EntryPoint, driver_body: &str) -> String {
    let mut out = String::with_capacity(source.len() + driver_body.len() + 1);
    let mut lines = source.split_inclusive('\n').peekable();
    let mut spliced = false;

    while let Some(line) = lines.next() {
        if spliced || !entry.opens(line) {
            out.push_str(line);
            continue;
        }

        while lines.peek().is_some_and(|next| entry.continues(next)) {
            lines.next();
        }
        push_body(&mut out, driver_body);
        spliced = true;
    }

    if !spliced {
        push_body(&mut out, driver_body);
    }
    out
}

fn push_body(out: &mut String, driver_body: &str) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(driver_body);
    if !driver_body.ends_with('\n') {
        out.push('\n');
    }
}

/// Substitute `body` for the single `marker` inside `template`.
pub fn substitute_marker(template: &str, marker: &str, body: &str) -> Result<String, HarnessError> {
    match template.matches(marker).count() {
        1 => Ok(template.replacen(marker, body, 1)),
        0 => Err(HarnessError::Template(format!("marker `{marker}` not found"))),
        n => Err(HarnessError::Template(format!(
            "marker `{marker}` appears {n} times"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRIVER: &str = "fn main():\n    run_driver()\n";

    #[test]
    fn test_replaces_main_block() {
        let src = "alias bench_size = 8\n\nfn bench_x(a: Int) -> Int:\n    return a\n\nfn main():\n    let a = 1\n\n    print(bench_x(a))\n";
        let out = replace_entry_point(src, &EntryPoint::MOJO, DRIVER);
        assert_eq!(
            out,
            "alias bench_size = 8\n\nfn bench_x(a: Int) -> Int:\n    return a\n\nfn main():\n    run_driver()\n"
        );
    }

    #[test]
    fn test_keeps_top_level_lines_after_block() {
        let src = "fn main():\n    demo()\nfn helper():\n    pass\n";
        let out = replace_entry_point(src, &EntryPoint::MOJO, DRIVER);
        assert_eq!(out, "fn main():\n    run_driver()\nfn helper():\n    pass\n");
    }

    #[test]
    fn test_nested_signature_text_is_ignored() {
        let src = "fn outer():\n    # fn main() is not here\n    fn main():\n        pass\n";
        let out = replace_entry_point(src, &EntryPoint::MOJO, DRIVER);
        assert_eq!(out.matches("run_driver()").count(), 1);
        assert!(out.starts_with(src));
    }

    #[test]
    fn test_only_one_driver_body() {
        let src = "fn main():\n    a()\nfn main():\n    b()\n";
        let out = replace_entry_point(src, &EntryPoint::MOJO, DRIVER);
        assert_eq!(out.matches("run_driver()").count(), 1);
    }

    #[test]
    fn test_appends_when_no_entry_point() {
        let out = replace_entry_point("fn bench_x():\n    pass", &EntryPoint::MOJO, DRIVER);
        assert_eq!(out, "fn bench_x():\n    pass\nfn main():\n    run_driver()\n");
    }

    #[test]
    fn test_substitute_marker() {
        let template = format!("head\n{WORKLOAD_MARKER}\ntail\n");
        let out = substitute_marker(&template, WORKLOAD_MARKER, "fn test() {}").unwrap();
        assert_eq!(out, "head\nfn test() {}\ntail\n");
    }

    #[test]
    fn test_marker_must_appear_once() {
        assert!(substitute_marker("no marker", WORKLOAD_MARKER, "x").is_err());
        let twice = format!("{WORKLOAD_MARKER}{WORKLOAD_MARKER}");
        let err = substitute_marker(&twice, WORKLOAD_MARKER, "x").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Staging);
    }
}

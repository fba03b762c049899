//! Output formatting for a parsed coverage model.
//!
//! [`CoberturaFormatter`] produces the Cobertura XML document:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">
//! <coverage line-rate=".." branch-rate=".." lines-covered=".." lines-valid=".."
//!           branches-covered=".." branches-valid=".." complexity="0" version="0" timestamp="..">
//!   <sources><source>.</source></sources>
//!   <packages>
//!     <package name=".." line-rate=".." branch-rate=".." complexity="0">
//!       <classes>
//!         <class name=".." filename=".." line-rate=".." branch-rate=".." complexity="0">
//!           <methods>
//!             <method name=".." signature="" line-rate=".." branch-rate="..">
//!               <lines><line number=".." hits=".." branch="false"/></lines>
//!             </method>
//!           </methods>
//!           <lines>
//!             <line number=".." hits=".." branch="true" condition-coverage="50% (1/2)"/>
//!           </lines>
//!         </class>
//!       </classes>
//!     </package>
//!   </packages>
//! </coverage>
//! ```
//!
//! Attribute order is fixed; consumers and golden files compare it verbatim.
//!
//! A method's `branch-rate` is the branch coverage of its declaration line
//! when that line has `BRDA` records; otherwise it equals its `line-rate`
//! (`1.0` when the method was hit, `0.0` when not).

use std::borrow::Cow;
use std::fmt::Write as _;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::model::{format_rate, rate, Class, CoverageModel, Method, Package};

/// Body of the `<!DOCTYPE>` declaration.
pub const DOCTYPE: &str =
    r#"coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd""#;

/// Paths in the report are relative to the working directory.
const SOURCE: &str = ".";

type XmlResult = quick_xml::Result<()>;

/// Trait for turning a coverage model into text.
pub trait ReportFormatter {
    /// Format the model to a string.
    fn format(&self, model: &CoverageModel) -> String;
}

/// Render `model` as a Cobertura XML document.
#[must_use]
pub fn render(model: &CoverageModel) -> String {
    CoberturaFormatter.format(model)
}

/// Cobertura XML formatter.
pub struct CoberturaFormatter;

impl ReportFormatter for CoberturaFormatter {
    fn format(&self, model: &CoverageModel) -> String {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        write_document(&mut writer, model).expect("writing XML into a Vec cannot fail");
        let mut xml = String::from_utf8_lossy(&writer.into_inner()).into_owned();
        xml.push('\n');
        xml
    }
}

fn write_document(w: &mut Writer<Vec<u8>>, model: &CoverageModel) -> XmlResult {
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;

    let summary = &model.summary;
    let timestamp = model.timestamp.to_string();
    let mut root = BytesStart::new("coverage");
    push_attributes(
        &mut root,
        &[
            ("line-rate", summary.line_rate().as_str()),
            ("branch-rate", summary.branch_rate().as_str()),
            ("lines-covered", summary.lines_covered.to_string().as_str()),
            ("lines-valid", summary.lines_total.to_string().as_str()),
            ("branches-covered", summary.branches_covered.to_string().as_str()),
            ("branches-valid", summary.branches_total.to_string().as_str()),
            ("complexity", "0"),
            ("version", "0"),
            ("timestamp", timestamp.as_str()),
        ],
    );
    w.write_event(Event::Start(root))?;

    w.write_event(Event::Start(BytesStart::new("sources")))?;
    w.write_event(Event::Start(BytesStart::new("source")))?;
    w.write_event(Event::Text(BytesText::new(SOURCE)))?;
    w.write_event(Event::End(BytesEnd::new("source")))?;
    w.write_event(Event::End(BytesEnd::new("sources")))?;

    if model.packages.is_empty() {
        w.write_event(Event::Empty(BytesStart::new("packages")))?;
    } else {
        w.write_event(Event::Start(BytesStart::new("packages")))?;
        for package in &model.packages {
            write_package(w, package)?;
        }
        w.write_event(Event::End(BytesEnd::new("packages")))?;
    }

    w.write_event(Event::End(BytesEnd::new("coverage")))
}

fn write_package(w: &mut Writer<Vec<u8>>, package: &Package) -> XmlResult {
    let mut el = BytesStart::new("package");
    push_attributes(
        &mut el,
        &[
            ("name", package.name.as_str()),
            ("line-rate", package.line_rate().as_str()),
            ("branch-rate", package.branch_rate().as_str()),
            ("complexity", "0"),
        ],
    );
    w.write_event(Event::Start(el))?;
    w.write_event(Event::Start(BytesStart::new("classes")))?;
    for class in &package.classes {
        write_class(w, class)?;
    }
    w.write_event(Event::End(BytesEnd::new("classes")))?;
    w.write_event(Event::End(BytesEnd::new("package")))
}

fn write_class(w: &mut Writer<Vec<u8>>, class: &Class) -> XmlResult {
    let mut el = BytesStart::new("class");
    push_attributes(
        &mut el,
        &[
            ("name", class.path.as_str()),
            ("filename", class.path.as_str()),
            ("line-rate", class.counts.line_rate().as_str()),
            ("branch-rate", class.counts.branch_rate().as_str()),
            ("complexity", "0"),
        ],
    );
    w.write_event(Event::Start(el))?;

    if class.methods.is_empty() {
        w.write_event(Event::Empty(BytesStart::new("methods")))?;
    } else {
        w.write_event(Event::Start(BytesStart::new("methods")))?;
        for method in &class.methods {
            write_method(w, class, method)?;
        }
        w.write_event(Event::End(BytesEnd::new("methods")))?;
    }

    if class.lines.is_empty() {
        w.write_event(Event::Empty(BytesStart::new("lines")))?;
    } else {
        w.write_event(Event::Start(BytesStart::new("lines")))?;
        for (number, line) in &class.lines {
            let mut el = BytesStart::new("line");
            let number = number.to_string();
            let hits = line.hit_count().to_string();
            if line.is_branch() {
                let condition = condition_coverage(line.branches_covered, line.branches_total);
                push_attributes(
                    &mut el,
                    &[
                        ("number", number.as_str()),
                        ("hits", hits.as_str()),
                        ("branch", "true"),
                        ("condition-coverage", condition.as_str()),
                    ],
                );
            } else {
                push_attributes(
                    &mut el,
                    &[("number", number.as_str()), ("hits", hits.as_str()), ("branch", "false")],
                );
            }
            w.write_event(Event::Empty(el))?;
        }
        w.write_event(Event::End(BytesEnd::new("lines")))?;
    }

    w.write_event(Event::End(BytesEnd::new("class")))
}

fn write_method(w: &mut Writer<Vec<u8>>, class: &Class, method: &Method) -> XmlResult {
    let hit = u64::from(method.hits > 0);
    let line_rate = format_rate(hit, 1);
    // A method on a branch line takes that line's branch coverage.
    let branch_rate = match method.line.and_then(|n| class.lines.get(&n)) {
        Some(line) if line.is_branch() => format_rate(line.branches_covered, line.branches_total),
        _ => line_rate.clone(),
    };

    let mut el = BytesStart::new("method");
    push_attributes(
        &mut el,
        &[
            ("name", method.name.as_str()),
            ("signature", ""),
            ("line-rate", line_rate.as_str()),
            ("branch-rate", branch_rate.as_str()),
        ],
    );
    w.write_event(Event::Start(el))?;

    match method.line {
        Some(number) => {
            w.write_event(Event::Start(BytesStart::new("lines")))?;
            let mut line = BytesStart::new("line");
            push_attributes(
                &mut line,
                &[
                    ("number", number.to_string().as_str()),
                    ("hits", method.hits.to_string().as_str()),
                    ("branch", "false"),
                ],
            );
            w.write_event(Event::Empty(line))?;
            w.write_event(Event::End(BytesEnd::new("lines")))?;
        }
        None => {
            w.write_event(Event::Empty(BytesStart::new("lines")))?;
        }
    }

    w.write_event(Event::End(BytesEnd::new("method")))
}

fn push_attributes(el: &mut BytesStart, attrs: &[(&str, &str)]) {
    for &(key, value) in attrs {
        el.push_attribute((key, &*xml_safe(value)));
    }
}

/// Replace characters XML 1.0 does not allow anywhere in a document (C0
/// controls other than tab, newline and carriage return, U+FFFE, U+FFFF)
/// with U+FFFD. Escaping cannot represent them.
fn xml_safe(value: &str) -> Cow<'_, str> {
    if value.chars().all(is_xml_char) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(
            value
                .chars()
                .map(|c| if is_xml_char(c) { c } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        )
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{FFFD}' | '\u{10000}'..)
}

/// `"<pct>% (<covered>/<total>)"`, with the percentage truncated.
fn condition_coverage(covered: u64, total: u64) -> String {
    let pct = if total == 0 { 0 } else { covered * 100 / total };
    format!("{pct}% ({covered}/{total})")
}

/// Plain text summary, for humans.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, model: &CoverageModel) -> String {
        let mut out = String::new();
        let summary = &model.summary;
        let classes: usize = model.packages.iter().map(|p| p.classes.len()).sum();

        writeln!(out, "Packages:   {}", model.packages.len()).unwrap();
        writeln!(out, "Files:      {classes}").unwrap();
        writeln!(
            out,
            "Lines:      {}/{} ({:.1}%)",
            summary.lines_covered,
            summary.lines_total,
            rate(summary.lines_covered, summary.lines_total) * 100.0
        )
        .unwrap();
        if summary.branches_total > 0 {
            writeln!(
                out,
                "Branches:   {}/{} ({:.1}%)",
                summary.branches_covered,
                summary.branches_total,
                rate(summary.branches_covered, summary.branches_total) * 100.0
            )
            .unwrap();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::LcovParser;

    fn model(input: &str) -> CoverageModel {
        LcovParser::new().timestamp(1346815648).parse(input)
    }

    #[test]
    fn test_condition_coverage() {
        assert_eq!(condition_coverage(1, 2), "50% (1/2)");
        assert_eq!(condition_coverage(2, 3), "66% (2/3)");
        assert_eq!(condition_coverage(0, 4), "0% (0/4)");
        assert_eq!(condition_coverage(4, 4), "100% (4/4)");
    }

    #[test]
    fn test_render_empty_model() {
        let xml = render(&model(""));
        assert_eq!(
            xml,
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<!DOCTYPE coverage SYSTEM \"http://cobertura.sourceforge.net/xml/coverage-04.dtd\">\n",
                "<coverage line-rate=\"0\" branch-rate=\"0\" lines-covered=\"0\" lines-valid=\"0\" ",
                "branches-covered=\"0\" branches-valid=\"0\" complexity=\"0\" version=\"0\" timestamp=\"1346815648\">\n",
                "  <sources>\n",
                "    <source>.</source>\n",
                "  </sources>\n",
                "  <packages/>\n",
                "</coverage>\n",
            )
        );
    }

    #[test]
    fn test_render_escapes_attributes() {
        let xml = render(&model("SF:src/a<b>&\"c\".c\nDA:1,1\nFN:1,operator<\nend_of_record\n"));
        assert!(xml.contains(r#"filename="src/a&lt;b&gt;&amp;&quot;c&quot;.c""#));
        assert!(xml.contains(r#"<method name="operator&lt;" signature="""#));
    }

    #[test]
    fn test_render_replaces_illegal_xml_chars() {
        let xml = render(&model("SF:src/a\u{1}b.c\nDA:1,1\nFN:1,f\u{1b}x\u{ffff}\nend_of_record\n"));
        assert!(xml.chars().all(is_xml_char));
        assert!(xml.contains("filename=\"src/a\u{fffd}b.c\""));
        assert!(xml.contains("<method name=\"f\u{fffd}x\u{fffd}\""));
    }

    #[test]
    fn test_xml_safe_keeps_legal_text() {
        assert!(matches!(xml_safe("src/ok\tfile é.c"), Cow::Borrowed(_)));
        assert_eq!(xml_safe("a\u{0}\u{8}\u{b}\u{1f}z"), "a\u{fffd}\u{fffd}\u{fffd}\u{fffd}z");
    }

    #[test]
    fn test_render_lines_sorted() {
        let xml = render(&model("SF:a.c\nDA:10,1\nDA:2,1\nDA:7,0\nend_of_record\n"));
        let two = xml.find(r#"number="2""#).unwrap();
        let seven = xml.find(r#"number="7""#).unwrap();
        let ten = xml.find(r#"number="10""#).unwrap();
        assert!(two < seven && seven < ten);
    }

    #[test]
    fn test_render_method_without_declaration() {
        let xml = render(&model("SF:a.c\nDA:1,1\nFNDA:2,ghost\nend_of_record\n"));
        assert!(xml.contains(
            "<method name=\"ghost\" signature=\"\" line-rate=\"1.0\" branch-rate=\"1.0\">\n              <lines/>\n"
        ));
    }

    #[test]
    fn test_render_is_deterministic() {
        let m = model("SF:src/a.c\nDA:1,1\nBRDA:1,0,0,1\nBRDA:1,0,1,-\nFN:1,main\nFNDA:1,main\nend_of_record\n");
        assert_eq!(render(&m), render(&m));
    }

    #[test]
    fn test_text_formatter() {
        let m = model("SF:foo/file.ext\nDA:1,1\nDA:2,0\nBRDA:1,1,1,1\nBRDA:1,1,2,0\nend_of_record\n");
        let out = TextFormatter.format(&m);
        assert!(out.contains("Packages:   1"));
        assert!(out.contains("Files:      1"));
        assert!(out.contains("Lines:      1/2 (50.0%)"));
        assert!(out.contains("Branches:   1/2 (50.0%)"));
    }
}

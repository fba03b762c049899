mod common;

const SAMPLE: &str = include_str!("fixtures/sample.info");

#[test]
fn parse_sample_packages() {
    let model = common::parser().base_path("/home/user/project").parse(SAMPLE);

    let names: Vec<_> = model.packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["src", "src.util", "tests", "."]);

    let src = model.package("src").unwrap();
    assert_eq!(src.counts.lines_total, 5);
    assert_eq!(src.counts.lines_covered, 2);
    assert_eq!(src.counts.branches_total, 4);
    assert_eq!(src.counts.branches_covered, 1);
    assert_eq!(src.line_rate(), "0.4");
    assert_eq!(src.branch_rate(), "0.25");

    let lib = src.class("src/lib.rs").unwrap();
    assert_eq!(lib.name, "lib.rs");
    assert_eq!(lib.lines[&11].hits, Some(0));
    assert_eq!(lib.method("main").unwrap().hits, 5);
    assert_eq!(lib.method("helper").unwrap().line, Some(10));

    // build.rs has no end_of_record but is still reported.
    let root = model.package(".").unwrap();
    assert_eq!(root.classes[0].path, "build.rs");
    assert_eq!(root.line_rate(), "1.0");

    assert_eq!(model.summary.lines_total, 10);
    assert_eq!(model.summary.lines_covered, 6);
    assert_eq!(model.summary.line_rate(), "0.6");
    assert_eq!(model.timestamp, common::TIMESTAMP);
}

#[test]
fn excluded_package_leaves_other_rates_alone() {
    let all = common::parser().base_path("/home/user/project").parse(SAMPLE);
    let filtered = common::parser()
        .base_path("/home/user/project")
        .exclude("tests")
        .parse(SAMPLE);

    assert!(filtered.package("tests").is_none());
    for package in &filtered.packages {
        let before = all.package(&package.name).unwrap();
        assert_eq!(package.counts, before.counts);
        assert_eq!(package.line_rate(), before.line_rate());
    }
    assert_eq!(filtered.summary.lines_total, 8);
    assert_eq!(filtered.summary.lines_covered, 5);
    assert_eq!(filtered.summary.line_rate(), "0.625");
}

#[test]
fn free_parse_matches_builder() {
    let excludes = ["foo".to_string()].into_iter().collect();
    let model = lcov_cobertura::parse(
        "SF:foo/file.ext\nDA:1,1\nDA:2,0\nend_of_record\nSF:bar/file.ext\nDA:1,1\nDA:2,1\nend_of_record\n",
        ".",
        &excludes,
    );
    assert!(model.package("foo").is_none());
    assert_eq!(model.package("bar").unwrap().line_rate(), "1.0");
}

#[test]
fn paths_outside_base_keep_their_directories() {
    let model = common::parser()
        .base_path("/home/user/project")
        .parse("SF:/usr/include/stdio.h\nDA:5,1\nend_of_record\n");
    let package = model.package("usr.include").unwrap();
    assert_eq!(package.classes[0].path, "/usr/include/stdio.h");
    assert_eq!(package.classes[0].name, "stdio.h");
}

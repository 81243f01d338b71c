//! Tests for project discovery

use stack_backup::backup::discover_projects;
use test_utils::{ResultAssertions, TestContext};

#[tokio::test]
async fn test_only_children_with_data_are_projects() {
    let ctx = TestContext::new();
    ctx.create_subdir("base/app/data");
    ctx.create_subdir("base/app/logs");
    ctx.create_subdir("base/tmp");
    ctx.create_subdir("base/web/public/data");
    ctx.create_file("base/notes/data", "a file, not a directory");
    ctx.create_file("base/README.md", "# host");

    let projects = discover_projects(&ctx.path("base")).await.assert_ok();

    let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["app"]);
    assert_eq!(projects[0].path, ctx.path("base/app"));
}

#[tokio::test]
async fn test_empty_base_yields_nothing() {
    let ctx = TestContext::new();
    ctx.create_subdir("base");

    assert!(discover_projects(&ctx.path("base")).await.assert_ok().is_empty());
}

#[tokio::test]
async fn test_missing_base_is_an_error() {
    let ctx = TestContext::new();

    discover_projects(&ctx.path("does-not-exist"))
        .await
        .assert_err_contains("Failed to read base directory");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_to_project_is_not_a_project() {
    let ctx = TestContext::new();
    ctx.create_file("base/app/data/settings.json", "{}");
    ctx.create_file("elsewhere/real/data/db.txt", "rows");
    std::os::unix::fs::symlink(ctx.path("elsewhere/real"), ctx.path("base/linked")).unwrap();

    let projects = discover_projects(&ctx.path("base")).await.assert_ok();

    let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["app"]);
}

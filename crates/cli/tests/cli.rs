use assert_cmd::Command;

#[test]
fn migrate_creates_schema_in_fresh_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("books.db").display());

    for _ in 0..2 {
        Command::cargo_bin("bookshelf")
            .unwrap()
            .current_dir(dir.path())
            .env("DATABASE_URL", &url)
            .env("BOOKSHELF_CONFIG_DIR", dir.path())
            .arg("migrate")
            .assert()
            .success();
    }

    assert!(dir.path().join("books.db").exists());
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("bookshelf")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}

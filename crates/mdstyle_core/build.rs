use std::fs;

const ELEMENTS: [&str; 18] = [
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "paragraph",
    "bold",
    "italic",
    "bold_italic",
    "strikethrough",
    "code",
    "code_block",
    "blockquote",
    "list",
    "list_item",
    "horizontal_rule",
    "link",
];

fn main() {
    let styles_path = "src/default_styles.toml";
    println!("cargo:rerun-if-changed={styles_path}");

    let content = fs::read_to_string(styles_path).expect("Failed to read default_styles.toml");
    let sheet = match content.parse::<toml::Table>() {
        Ok(sheet) => sheet,
        Err(e) => panic!("Invalid default_styles.toml: {e}"),
    };

    // The built-in sheet names every element so users can see what to override
    let Some(styles) = sheet.get("styles").and_then(toml::Value::as_table) else {
        panic!("default_styles.toml has no [styles] table");
    };
    for element in ELEMENTS {
        if !styles.get(element).is_some_and(toml::Value::is_table) {
            panic!("default_styles.toml is missing [styles.{element}]");
        }
    }
}

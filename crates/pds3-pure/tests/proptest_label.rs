use pds3_pure::value::Number;
use pds3_pure::{filter_units, parse_label, serialize_label, Primitive, Value};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

/// One generated statement value and the primitive it must serialize to.
#[derive(Clone, Debug)]
enum Entry {
    Integer(i64),
    Symbol(String),
    Text(String),
    Quantity(Number, String),
}

impl Entry {
    fn label_text(&self) -> String {
        match self {
            Entry::Integer(n) => n.to_string(),
            Entry::Symbol(s) => s.clone(),
            Entry::Text(s) => format!("\"{s}\""),
            Entry::Quantity(n, unit) => format!("{n} <{unit}>"),
        }
    }

    fn expected(&self) -> Primitive {
        match self {
            Entry::Integer(n) => Primitive::String(n.to_string()),
            Entry::Symbol(s) | Entry::Text(s) => Primitive::String(s.clone()),
            Entry::Quantity(n, unit) => Primitive::Quantity(*n, unit.clone()),
        }
    }
}

fn arb_unit() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["s", "K", "km", "BYTES", "deg", "m/s", "W/m**2/sr/nm"])
        .prop_map(str::to_string)
}

fn arb_number() -> impl Strategy<Value = Number> {
    prop_oneof![
        any::<i32>().prop_map(|n| Number::Integer(n.into())),
        (-1.0e6f64..1.0e6).prop_map(Number::Real),
    ]
}

fn arb_entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        any::<i64>().prop_map(Entry::Integer),
        "[A-Z][A-Z0-9_]{0,12}".prop_map(Entry::Symbol),
        "[a-zA-Z0-9 ,.:_-]{0,24}".prop_map(Entry::Text),
        (arb_number(), arb_unit()).prop_map(|(n, u)| Entry::Quantity(n, u)),
    ]
}

fn arb_statements() -> impl Strategy<Value = Vec<(String, Entry)>> {
    prop::collection::vec(("[A-Z][A-Z_]{0,8}", arb_entry()), 0..12).prop_map(keyed)
}

/// A generated statement: a plain value or an `OBJECT`/`GROUP` block.
#[derive(Clone, Debug)]
enum Node {
    Leaf(Entry),
    Block { object: bool, children: Vec<(String, Node)> },
}

impl Node {
    fn expected(&self) -> Primitive {
        match self {
            Node::Leaf(entry) => entry.expected(),
            Node::Block { children, .. } => expected_map(children),
        }
    }
}

fn expected_map(children: &[(String, Node)]) -> Primitive {
    Primitive::Map(
        children
            .iter()
            .map(|(key, node)| (key.clone(), node.expected()))
            .collect(),
    )
}

/// Prefix keys with their position so every key in a block is distinct.
fn keyed<T>(items: Vec<(String, T)>) -> Vec<(String, T)> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, (key, item))| (format!("K{i}_{key}"), item))
        .collect()
}

fn arb_tree() -> impl Strategy<Value = Vec<(String, Node)>> {
    let node = arb_entry()
        .prop_map(Node::Leaf)
        .prop_recursive(3, 32, 5, |inner| {
            (
                any::<bool>(),
                prop::collection::vec(("[A-Z][A-Z_]{0,8}", inner), 1..5),
            )
                .prop_map(|(object, children)| Node::Block {
                    object,
                    children: keyed(children),
                })
        });
    prop::collection::vec(("[A-Z][A-Z_]{0,8}", node), 0..8).prop_map(keyed)
}

fn render_nodes(text: &mut String, nodes: &[(String, Node)], depth: usize) {
    let indent = "  ".repeat(depth);
    for (key, node) in nodes {
        match node {
            Node::Leaf(entry) => text.push_str(&format!("{indent}{key} = {}\n", entry.label_text())),
            Node::Block { object, children } => {
                let kind = if *object { "OBJECT" } else { "GROUP" };
                text.push_str(&format!("{indent}{kind} = {key}\n"));
                render_nodes(text, children, depth + 1);
                text.push_str(&format!("{indent}END_{kind} = {key}\n"));
            }
        }
    }
}

fn render(statements: &[(String, Entry)]) -> String {
    let mut text = String::from("PDS_VERSION_ID = PDS3\n");
    for (key, entry) in statements {
        text.push_str(&format!("{key} = {}\n", entry.label_text()));
    }
    text.push_str("END\n");
    text
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn serialize_keeps_keys_and_quantities_in_order(statements in arb_statements()) {
        let label = parse_label(&render(&statements)).expect("parse generated label");
        let Primitive::Map(entries) = serialize_label(&label) else {
            panic!("root is not a map");
        };

        prop_assert_eq!(entries.len(), statements.len() + 1);
        for ((key, entry), (out_key, out_value)) in statements.iter().zip(entries.iter().skip(1)) {
            prop_assert_eq!(key, out_key);
            prop_assert_eq!(&entry.expected(), out_value);
        }
    }

    #[test]
    fn nested_blocks_keep_key_order(tree in arb_tree()) {
        let mut text = String::from("PDS_VERSION_ID = PDS3\n");
        render_nodes(&mut text, &tree, 0);
        text.push_str("END\n");

        let label = parse_label(&text).expect("parse generated nested label");
        let Primitive::Map(mut entries) = serialize_label(&label) else {
            panic!("root is not a map");
        };
        prop_assert_eq!(entries.remove(0).0, "PDS_VERSION_ID");
        prop_assert_eq!(Primitive::Map(entries), expected_map(&tree));
    }

    #[test]
    fn unit_filter_is_idempotent(statements in arb_statements(), celsius in prop::collection::vec(0usize..12, 0..4)) {
        let mut text = String::from("OBJECT = IMAGE\n");
        for (i, (key, entry)) in statements.iter().enumerate() {
            text.push_str(&format!("{key} = {}\n", entry.label_text()));
            if celsius.contains(&i) {
                text.push_str(&format!("T{i} = ({i}.5 <degC>,\n  {i} <DEGC>)\n"));
            }
        }
        text.push_str("END_OBJECT = IMAGE\nEND\n");

        let once = filter_units(&text);
        prop_assert_eq!(filter_units(&once), once.clone());
        prop_assert!(!once.to_ascii_lowercase().contains("<degc>"));

        let label = parse_label(&once).expect("filtered label parses");
        let image = label.get("IMAGE").and_then(Value::as_group).expect("image block kept");
        prop_assert_eq!(image.len(), statements.len());
    }

    #[test]
    fn repeated_blocks_form_a_sequence(count in 2usize..6) {
        let mut text = String::new();
        for i in 0..count {
            text.push_str(&format!("OBJECT = \"X\"\n  INDEX = {i}\nEND_OBJECT = X\n"));
        }
        text.push_str("END\n");

        let label = parse_label(&text).expect("parse repeated blocks");
        let Some(Value::Sequence(items)) = label.get("X") else {
            panic!("repeated blocks are not a sequence");
        };
        prop_assert_eq!(items.len(), count);
        for (i, item) in items.iter().enumerate() {
            let group = item.as_group().expect("sequence item is a group");
            prop_assert_eq!(group.get("INDEX").and_then(Value::as_integer), Some(i as i64));
        }
    }
}

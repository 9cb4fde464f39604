//! End-to-end tests: transport payload to validated action.

use bee_proto::{
    first_match, parse_console, parse_json, parse_query, parse_url, Action, Params,
    PermissionRule, ProtocolError, RuleSpec, ShortcutTable, Value,
};
use indexmap::IndexMap;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,7}"
}

proptest! {
    #[test]
    fn query_form_yields_ready_action(
        modules in prop::collection::vec(segment(), 1..4),
        class in "[A-Z][a-zA-Z]{0,7}",
        function in segment(),
        data in prop::collection::btree_map("[a-z]{1,6}", "v[a-z0-9]{0,6}", 0..5),
    ) {
        let module = modules.join(".");
        let query = data
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let expr = parse_query(&format!("{module}.{class}.{function}?{query}")).unwrap();
        let action = Action::try_from(expr).unwrap();

        prop_assert!(action.ready());
        prop_assert_eq!(action.module(), module.as_str());
        prop_assert_eq!(action.class(), class.as_str());
        prop_assert_eq!(action.function(), function.as_str());
        let got: BTreeMap<String, Value> = action
            .data()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let want: BTreeMap<String, Value> =
            data.into_iter().map(|(k, v)| (k, Value::Str(v))).collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn any_missing_key_fails_construction(mask in 0u8..7) {
        let mut root = serde_json::Map::new();
        if mask & 1 != 0 { root.insert("_m".into(), "m".into()); }
        if mask & 2 != 0 { root.insert("_c".into(), "C".into()); }
        if mask & 4 != 0 { root.insert("_f".into(), "f".into()); }
        let text = serde_json::Value::Object(root).to_string();
        let batch = parse_json(&text).unwrap();
        let expr = batch.into_iter().next().unwrap().unwrap();
        prop_assert!(Action::try_from(expr).is_err());
    }
}

#[test]
fn test_console_and_query_agree() {
    let a = parse_console("shop/orders/Cart/add qty='i+ 2' note=hi").unwrap();
    let b = parse_query("shop.orders.Cart.add?qty=i+ 2&note=hi").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_web_path_requires_single_segment_module() {
    assert!(parse_url("/users/Account/find").is_ok());
    assert!(matches!(
        parse_url("/shop/orders/Cart/add"),
        Err(ProtocolError::Parse(_))
    ));
}

#[test]
fn test_rule_admits_only_matching_actions() {
    let rule = PermissionRule::new(RuleSpec {
        c: Some("Foo".into()),
        params: IndexMap::from([("id".to_string(), "^[0-9]+$".to_string())]),
        ..Default::default()
    })
    .unwrap();
    let rules = [rule];

    let ok = Action::try_from(parse_query("m.Foo.get?id=42").unwrap()).unwrap();
    let bad_id = Action::try_from(parse_query("m.Foo.get?id=abc").unwrap()).unwrap();
    let bad_class = Action::try_from(parse_query("m.Bar.get?id=42").unwrap()).unwrap();

    assert!(first_match(&rules, &ok).is_some());
    assert!(first_match(&rules, &bad_id).is_none());
    assert!(first_match(&rules, &bad_class).is_none());
}

#[test]
fn test_shortcut_then_action() {
    let table = ShortcutTable::from_yaml_str(
        "pong:\n  _m: system\n  _c: Info\n  _f: ping\n  data:\n    echo: yes-please\n",
    )
    .unwrap();
    let expr = table.apply(parse_console("pong extra='i+ 1'").unwrap());
    let action = Action::try_from(expr).unwrap();
    assert_eq!(action.target(), "system.Info.ping");

    let mut expected = Params::new();
    expected.insert("echo".into(), Value::from("yes-please"));
    expected.insert("extra".into(), Value::Int(1));
    assert_eq!(action.data(), &expected);
}

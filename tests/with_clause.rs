use pretty_assertions::assert_eq;
use qail_cte::prelude::*;

fn posts_cte() -> &'static str {
    "popular_posts AS (SELECT * FROM posts WHERE views_count > 100)"
}

#[test]
fn test_same_cte_twice_renders_once() {
    let cmd = QailCmd::get("popular_posts")
        .with(posts_cte())
        .unwrap()
        .with(posts_cte())
        .unwrap();

    assert_eq!(cmd.ctes().len(), 1);
    assert_eq!(
        cmd.to_sql(),
        "WITH popular_posts AS (SELECT * FROM posts WHERE views_count > 100) SELECT * FROM popular_posts"
    );
}

#[test]
fn test_order_is_declaration_order() {
    let one_call = QailCmd::get("c")
        .with(WithArg::map([
            ("a", "SELECT 1"),
            ("b", "SELECT * FROM a"),
            ("c", "SELECT * FROM b"),
        ]))
        .unwrap();

    let three_calls = QailCmd::get("c")
        .with("a AS (SELECT 1)")
        .unwrap()
        .with(CteDefinition::sql("b", "SELECT * FROM a"))
        .unwrap()
        .with(vec![CteDefinition::sql("c", "SELECT * FROM b")])
        .unwrap();

    let expected =
        "WITH a AS (SELECT 1), b AS (SELECT * FROM a), c AS (SELECT * FROM b) SELECT * FROM c";
    assert_eq!(one_call.to_sql(), expected);
    assert_eq!(three_calls.to_sql(), expected);
}

#[test]
fn test_recursive_survives_later_calls() {
    let tree = "tree AS (SELECT 1 AS n UNION ALL SELECT n + 1 FROM tree WHERE n < 10)";
    let cmd = QailCmd::get("tree")
        .with_recursive(tree)
        .unwrap()
        .with("extra AS (SELECT 2)")
        .unwrap()
        .merge(&QailCmd::get("other").with("more AS (SELECT 3)").unwrap());

    assert!(cmd.ctes().is_recursive());
    assert!(cmd.to_sql().starts_with("WITH RECURSIVE tree AS"));
}

#[test]
fn test_recursive_comes_from_merged_query() {
    let plain = QailCmd::get("t").with("a AS (SELECT 1)").unwrap();
    let recursive = QailCmd::get("t")
        .with_recursive("r AS (SELECT 1 UNION ALL SELECT 1 FROM r)")
        .unwrap();

    assert!(plain.merge(&recursive).ctes().is_recursive());
}

#[test]
fn test_merge_union_keeps_shared_definition() {
    let left = CteRegistry::new()
        .attach(vec![WithArg::map([("a", "SELECT 1"), ("b", "SELECT 2")])], false)
        .unwrap();
    let right = CteRegistry::new()
        .attach(vec![WithArg::map([("b", "SELECT 2"), ("c", "SELECT 3")])], false)
        .unwrap();

    let merged = left.merge(&right);
    assert_eq!(merged.names(), vec!["a", "b", "c"]);
    assert_eq!(merged.get("b").unwrap().body, CteBody::Sql("SELECT 2".to_string()));
    assert!(merged.conflicts().is_empty());

    // Inputs are untouched
    assert_eq!(left.names(), vec!["a", "b"]);
    assert_eq!(right.names(), vec!["b", "c"]);
}

#[test]
fn test_merge_conflict_reaches_the_sql() {
    let left = QailCmd::get("a").with("a AS (SELECT 1)").unwrap();
    let right = QailCmd::get("a").with("a AS (SELECT 2)").unwrap();

    let merged = left.merge(&right);
    assert_eq!(merged.ctes().conflicts(), vec!["a"]);
    assert_eq!(
        merged.to_sql(),
        "WITH a AS (SELECT 1), a AS (SELECT 2) SELECT * FROM a"
    );
}

#[test]
fn test_sub_query_bodies_compare_structurally() {
    let active = QailCmd::get("users").cage("active", true);
    let cmd = QailCmd::get("active_users")
        .with(WithArg::map([("active_users", active.clone())]))
        .unwrap()
        .with(WithArg::map([("active_users", active)]))
        .unwrap();

    assert_eq!(cmd.ctes().len(), 1);
    assert_eq!(
        cmd.to_sql(),
        "WITH active_users AS (SELECT * FROM users WHERE active = true) SELECT * FROM active_users"
    );
}

#[test]
fn test_parser_examples() {
    let cases = [
        (
            "popular_posts AS (SELECT * FROM posts WHERE views_count > 100)",
            "popular_posts",
            "SELECT * FROM posts WHERE views_count > 100",
        ),
        (
            "`quoted_table` AS (SELECT * FROM posts)",
            "quoted_table",
            "SELECT * FROM posts",
        ),
        (
            "   popular_posts   AS   (   SELECT * FROM posts   )   ",
            "popular_posts",
            "SELECT * FROM posts",
        ),
        (
            "popular_posts as (SELECT * FROM posts WHERE views_count > (SELECT AVG(views_count) FROM posts))",
            "popular_posts",
            "SELECT * FROM posts WHERE views_count > (SELECT AVG(views_count) FROM posts)",
        ),
    ];

    for (input, table, expression) in cases {
        let cte = qail_cte::parse(input).unwrap();
        assert_eq!(cte.table_name, table);
        assert_eq!(cte.expression, expression);
    }
}

#[test]
fn test_parser_failures() {
    let message = |input: &str| qail_cte::parse(input).unwrap_err().to_string();

    assert!(message("popular_posts (SELECT * FROM posts)").contains("AS"));
    assert!(message("popular_posts AS SELECT * FROM posts").contains("parentheses"));
    assert!(
        message("popular_posts AS (SELECT * FROM posts WHERE views_count > (100")
            .starts_with("Unbalanced parentheses")
    );
    assert!(message(" AS (SELECT * FROM posts)").starts_with("Empty table name"));
    assert!(message("popular_posts AS (   )").starts_with("Empty expression"));
}

#[test]
fn test_attach_usage_errors() {
    let cmd = QailCmd::get("t");

    assert!(matches!(
        cmd.clone().with_args(vec![], false).unwrap_err(),
        CteError::NoArguments
    ));
    assert!(matches!(
        cmd.clone()
            .with(WithArg::List(vec![WithArg::map([("a", "SELECT 1")])]))
            .unwrap_err(),
        CteError::NestedMapping
    ));
    assert!(matches!(
        cmd.clone()
            .with(WithArg::map([("a", WithValue::Null)]))
            .unwrap_err(),
        CteError::NilBody(_)
    ));
    assert!(matches!(
        cmd.clone()
            .with(WithArg::map([("a", vec![QailCmd::get("x"), QailCmd::get("y")])]))
            .unwrap_err(),
        CteError::CollectionBody(_)
    ));
}

#[test]
fn test_failed_with_leaves_query_usable() {
    let base = QailCmd::get("a").with("a AS (SELECT 1)").unwrap();
    assert!(base.clone().with("not a cte").is_err());
    assert_eq!(base.to_sql(), "WITH a AS (SELECT 1) SELECT * FROM a");
}

#[test]
fn test_render_is_idempotent_and_extendable() {
    let ctes = CteRegistry::new()
        .attach(vec![posts_cte().into()], false)
        .unwrap();

    let first = ctes.render();
    assert_eq!(first, ctes.render());

    let extended = ctes.attach(vec!["b AS (SELECT 2)".into()], false).unwrap();
    assert_eq!(
        extended.render(),
        format!("{}, b AS (SELECT 2)", first)
    );
}

#[test]
fn test_json_shape() {
    let cte = qail_cte::parse("t AS (SELECT 1)").unwrap();
    let json = serde_json::to_value(&cte).unwrap();
    assert_eq!(json["table_name"], "t");
    assert_eq!(json["expression"], "SELECT 1");

    let def = cte.into_definition();
    let json = serde_json::to_value(&def).unwrap();
    assert_eq!(json["body"]["kind"], "sql");
    assert_eq!(json["body"]["value"], "SELECT 1");
}

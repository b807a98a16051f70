use vibexpr::expression::*;

fn x() -> Node {
    Node::ident("x")
}

fn select_from_t(where_: Node) -> Query {
    let mut s = Select::new(
        vec![Binding::new(x())],
        Some(Node::table(Node::ident("t"))),
    );
    s.where_ = Some(where_);
    Query::new(Node::from(s))
}

fn where_of(q: &Query) -> Option<&Node> {
    match &q.body {
        Node::Select(s) => s.where_.as_ref(),
        other => panic!("body is not a select: {}", other),
    }
}

#[test]
fn test_check_simplify_encode_decode() {
    // 1 + 2 < x AND TRUE
    let filter = Node::and(
        Node::compare(
            CmpOp::Lt,
            Node::add(Node::Integer(1), Node::Integer(2)),
            x(),
        ),
        Node::Bool(true),
    );
    let q = select_from_t(filter);
    check_query(&q, &NoHint).unwrap();

    let simplified = simplify_query(q, &NoHint);
    check_query(&simplified, &NoHint).unwrap();
    assert_eq!(
        where_of(&simplified),
        Some(&Node::compare(CmpOp::Gt, x(), Node::Integer(3)))
    );
    assert!(simplified.to_string().contains("WHERE x > 3"));

    let buf = encode_query(&simplified).unwrap();
    let back = decode_query(&buf).unwrap();
    assert_eq!(back, simplified);
    assert_eq!(back.to_string(), simplified.to_string());
    assert_eq!(decode_any(&buf).unwrap(), Decoded::Query(simplified));
}

#[test]
fn test_finite_set_removes_filter() {
    let values = vec![Node::Integer(4), Node::Integer(5), Node::Integer(6)];
    let values = FiniteSet::new(values).unwrap();
    let hint = PathHint::new().with_values(x(), values);

    let q = select_from_t(Node::compare(CmpOp::Gt, x(), Node::Integer(3)));
    let simplified = simplify_query(q, &hint);
    assert_eq!(where_of(&simplified), None);

    let q = select_from_t(Node::compare(CmpOp::Gt, x(), Node::Integer(5)));
    let simplified = simplify_query(q.clone(), &hint);
    assert_eq!(simplified, q);
}

#[test]
fn test_hint_gates_rewrites() {
    let n = Node::add(x(), Node::Integer(0));
    assert_eq!(simplify(n.clone(), &NoHint), n);

    let ints = HintFn(|_: &Node| TypeSet::INTEGER);
    assert_eq!(simplify(n, &ints), x());

    let strings = PathHint::new().with_type(x(), TypeSet::STRING);
    assert_eq!(type_of(&x(), &strings), TypeSet::STRING);
    assert!(check_hint(&Node::neg(x()), &strings).is_err());
    assert!(check_hint(&Node::neg(x()), &ints).is_ok());
}

#[test]
fn test_simplify_is_idempotent() {
    let n = Node::and(
        Node::or(
            Node::member(x(), vec![Node::Integer(3), Node::Integer(1)]),
            Node::Bool(false),
        ),
        Node::not(Node::compare(
            CmpOp::Le,
            Node::mul(Node::Integer(2), Node::ident("y")),
            Node::Integer(10),
        )),
    );
    let once = simplify(n, &NoHint);
    let twice = simplify(once.clone(), &NoHint);
    assert_eq!(once, twice);
    assert!(equivalent(&once, &twice));
}

#[test]
fn test_numbers_compare_by_value() {
    assert_eq!(Node::Integer(3), Node::Float(3.0));
    assert!(equivalent(&Node::rational(6, 2).unwrap(), &Node::Integer(3)));
    assert_ne!(Node::Integer(3), Node::string("3"));

    let a = Node::compare(CmpOp::Eq, x(), Node::Integer(1));
    let b = Node::compare(CmpOp::Eq, x(), Node::Float(1.0));
    assert!(equivalent(&a, &b));
}

#[test]
fn test_checker_reports_errors() {
    let bad = Node::add(Node::string("a"), Node::Integer(1));
    let err = check(&bad).unwrap_err();
    assert!(err.is_type_error());
    assert!(err.to_string().contains("ill-typed"));

    let q = select_from_t(Node::compare(CmpOp::Eq, Node::Integer(1), Node::string("a")));
    assert!(check_query(&q, &NoHint).is_err());
}

#[test]
fn test_redaction_survives_encoding() {
    let n = Node::and(
        Node::compare(CmpOp::Eq, Node::ident("name"), Node::string("alice")),
        Node::compare(CmpOp::Lt, Node::ident("age"), Node::Integer(987_654)),
    );
    let back = decode(&encode(&n).unwrap()).unwrap();
    assert_eq!(back, n);

    let text = redacted(&back);
    assert_eq!(text, redacted(&n));
    assert!(!text.contains("alice"));
    assert!(!text.contains("987654"));
    assert!(n.to_string().contains("'alice'"));
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(decode(b"").is_err());
    assert!(decode(b"not an expression").is_err());
    assert!(decode_query(&encode(&x()).unwrap()).is_err());
}

#[test]
fn test_walk_and_rewrite() {
    struct Idents(Vec<String>);

    impl Visitor for Idents {
        fn visit(&mut self, node: &Node) -> bool {
            if let Node::Ident(name) = node {
                self.0.push(name.clone());
            }
            true
        }
    }

    let n = Node::and(
        Node::compare(CmpOp::Eq, Node::ident("a"), Node::Integer(1)),
        Node::compare(CmpOp::Eq, Node::ident("b"), Node::Integer(2)),
    );
    let mut idents = Idents(Vec::new());
    walk(&mut idents, &n);
    assert_eq!(idents.0, vec!["a", "b"]);

    let renamed = rewrite(n, &mut |node| match node {
        Node::Ident(name) => Node::ident(name.to_uppercase()),
        other => other,
    });
    assert_eq!(renamed.to_string(), "A = 1 AND B = 2");
}

#[test]
fn test_folded_list_keeps_exact_values() {
    let third = Node::div(Node::Integer(1), Node::Integer(3));
    let n = Node::call(BuiltinOp::MakeList, vec![third, Node::Float(0.5)]);
    let folded = simplify(n, &NoHint);
    let expected = Node::List(List::new(vec![
        Node::rational(1, 3).unwrap(),
        Node::Float(0.5),
    ]));
    assert_eq!(folded, expected);

    let back = decode(&encode(&folded).unwrap()).unwrap();
    assert!(equivalent(&back, &folded));

    let with_missing = Node::List(List::new(vec![Node::Missing]));
    assert!(matches!(
        encode(&with_missing),
        Err(EncodeError::NotConstant { .. })
    ));
}

use proptest::prelude::*;
use vibexpr::expression::*;

fn arb_constant() -> impl Strategy<Value = Node> {
    prop_oneof![
        Just(Node::Null),
        any::<bool>().prop_map(Node::Bool),
        (-100i64..100).prop_map(Node::Integer),
        (-1000.0f64..1000.0).prop_map(Node::Float),
        (-20i128..20, 1i128..10).prop_filter_map("zero denominator", |(n, d)| Node::rational(n, d)),
        "[a-z]{0,6}".prop_map(Node::string),
    ]
}

fn arb_literal() -> impl Strategy<Value = Node> {
    prop_oneof![
        prop::collection::vec(arb_constant(), 0..4).prop_map(|v| Node::List(List::new(v))),
        prop::collection::btree_map("[a-c]", arb_constant(), 0..3).prop_map(|fields| {
            let fields = fields
                .into_iter()
                .map(|(label, value)| Field::new(label, value))
                .collect();
            Node::Struct(Struct::new(fields))
        }),
    ]
}

fn arb_leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        4 => arb_constant(),
        1 => Just(Node::Missing),
        1 => arb_literal(),
        2 => prop_oneof![Just("a"), Just("b"), Just("c")].prop_map(Node::ident),
    ]
}

fn arb_cmp() -> impl Strategy<Value = CmpOp> {
    prop_oneof![
        Just(CmpOp::Eq),
        Just(CmpOp::Ne),
        Just(CmpOp::Lt),
        Just(CmpOp::Le),
        Just(CmpOp::Gt),
        Just(CmpOp::Ge),
    ]
}

fn arb_is() -> impl Strategy<Value = IsKeyword> {
    prop_oneof![
        Just(IsKeyword::IsNull),
        Just(IsKeyword::IsNotNull),
        Just(IsKeyword::IsMissing),
        Just(IsKeyword::IsTrue),
        Just(IsKeyword::IsNotFalse),
    ]
}

fn arb_select(depth: u32) -> BoxedStrategy<Node> {
    (arb_node(depth), arb_node(depth))
        .prop_map(|(col, filter)| {
            let mut s = Select::new(
                vec![Binding::new(col)],
                Some(Node::table(Node::ident("t"))),
            );
            s.where_ = Some(filter);
            Node::from(s)
        })
        .boxed()
}

fn arb_union(depth: u32) -> BoxedStrategy<Node> {
    (any::<bool>(), arb_select(depth), arb_select(depth))
        .prop_map(|(all, l, r)| {
            let kind = if all { UnionType::All } else { UnionType::Distinct };
            Node::union(kind, l, r)
        })
        .boxed()
}

fn arb_node(depth: u32) -> BoxedStrategy<Node> {
    if depth == 0 {
        return arb_leaf().boxed();
    }

    let sub = || arb_node(depth - 1);
    prop_oneof![
        arb_leaf(),
        sub().prop_map(Node::not),
        (sub(), sub()).prop_map(|(l, r)| Node::and(l, r)),
        (sub(), sub()).prop_map(|(l, r)| Node::or(l, r)),
        (arb_cmp(), sub(), sub()).prop_map(|(op, l, r)| Node::compare(op, l, r)),
        (sub(), sub()).prop_map(|(l, r)| Node::add(l, r)),
        (sub(), sub()).prop_map(|(l, r)| Node::mul(l, r)),
        (sub(), arb_is()).prop_map(|(n, key)| Node::is(n, key)),
        (sub(), prop::collection::vec(-5i64..5, 1..4)).prop_map(|(n, vals)| {
            Node::member(n, vals.into_iter().map(Node::Integer).collect())
        }),
        (sub(), sub(), sub()).prop_map(|(w, t, e)| Node::case(vec![(w, t)], Some(e))),
        sub().prop_map(|n| Node::call(BuiltinOp::Upper, vec![n])),
        sub().prop_map(|n| Node::call(BuiltinOp::Abs, vec![n])),
        prop::collection::vec(sub(), 0..3).prop_map(|args| Node::call(BuiltinOp::MakeList, args)),
        (sub(), prop::option::of(sub())).prop_map(|(col, filter)| {
            let mut s = Select::new(
                vec![Binding::new(col)],
                Some(Node::table(Node::ident("t"))),
            );
            s.where_ = filter;
            Node::from(s)
        }),
    ]
    .boxed()
}

proptest! {
    #[test]
    fn encode_decode_roundtrip(node in arb_node(3)) {
        let back = decode(&encode(&node).expect("node should encode"))
            .expect("encoded node should decode");
        prop_assert!(equivalent(&back, &node), "{} decoded as {}", node, back);
        prop_assert_eq!(back.to_string(), node.to_string());
    }

    #[test]
    fn simplify_reaches_fixpoint(node in arb_node(3)) {
        let once = simplify(node, &NoHint);
        let twice = simplify(once.clone(), &NoHint);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn simplified_node_survives_encoding(node in arb_node(3)) {
        let simplified = simplify_logic(node, &NoHint);
        let back = decode(&encode(&simplified).expect("simplified node should encode"))
            .expect("simplified node should decode");
        prop_assert_eq!(back, simplified);
    }

    #[test]
    fn relation_roundtrip(node in arb_union(2)) {
        let buf = encode(&node).expect("union should encode");
        let back = decode(&buf).expect("encoded union should decode");
        prop_assert_eq!(back.to_string(), node.to_string());
        prop_assert_eq!(back, node);
    }

    #[test]
    fn simplified_relation_survives_encoding(node in arb_union(2)) {
        let simplified = simplify(node, &NoHint);
        let buf = encode(&simplified).expect("simplified union should encode");
        let back = decode(&buf).expect("simplified union should decode");
        prop_assert_eq!(back, simplified);
    }

    #[test]
    fn redaction_is_deterministic(node in arb_node(3)) {
        prop_assert_eq!(redacted(&node), redacted(&node.clone()));
    }
}

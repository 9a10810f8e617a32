use proptest::prelude::*;
use store_middleware::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Start,
    Accept,
    Cancel,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![Just(Step::Start), Just(Step::Accept), Just(Step::Cancel)]
}

fn unquote_postgres(quoted: &str) -> String {
    let (escaped, body) = match quoted.strip_prefix(" E") {
        Some(rest) => (true, rest),
        None => (false, quoted),
    };
    let body = &body[1..body.len() - 1];
    let mut out = String::new();
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        out.push(ch);
        if ch == '\'' || (escaped && ch == '\\') {
            assert_eq!(chars.next(), Some(ch), "unpaired {ch} in {quoted}");
        }
    }
    out
}

proptest! {
    #[test]
    fn port_setter_accepts_exactly_u16(port in -100_000i64..200_000) {
        let mut endpoint = Endpoint::new();
        endpoint.set_port(5432).unwrap();
        let accepted = endpoint.set_port(port).is_ok();
        prop_assert_eq!(accepted, (0..=65_535).contains(&port));
        let expected = if accepted { u16::try_from(port).unwrap() } else { 5432 };
        prop_assert_eq!(endpoint.port(), Some(expected));
    }

    #[test]
    fn connect_tries_must_be_positive(tries in -10i64..10) {
        let mut endpoint = Endpoint::new();
        prop_assert_eq!(endpoint.set_connect_tries(tries).is_ok(), tries >= 1);
        prop_assert!(endpoint.connect_tries() >= 1);
    }

    #[test]
    fn postgres_literals_unquote_to_input(text in "[^\\x00]*") {
        let quoted = PostgresDialect.quote_literal(&text);
        prop_assert_eq!(quoted.starts_with(" E"), text.contains('\\'));
        prop_assert_eq!(unquote_postgres(&quoted), text);
    }

    #[test]
    fn postgres_identifiers_stay_one_token(text in "[^\\x00]*") {
        let quoted = PostgresDialect.quote_identifier(&text);
        let inner = &quoted[1..quoted.len() - 1];
        prop_assert_eq!(inner.replace("\"\"", "\""), text);
    }

    #[test]
    fn integers_render_as_themselves(n in any::<i64>()) {
        let sql = Template::parse("{{ int(n) }}").unwrap()
            .render(&params! { "n" => n }, &PostgresDialect).unwrap();
        prop_assert_eq!(sql, n.to_string());
        prop_assert_eq!(Value::from(n.to_string()).to_int(), n);
    }

    #[test]
    fn in_lists_keep_every_element(items in prop::collection::vec(any::<i32>(), 1..20)) {
        let sql = Template::parse("{{ inint(ids) }}").unwrap()
            .render(&params! { "ids" => items.clone() }, &PostgresDialect).unwrap();
        let expected: Vec<String> = items.iter().map(ToString::to_string).collect();
        prop_assert_eq!(sql, format!("({})", expected.join(",")));
    }

    #[test]
    fn bool_renders_truthiness(text in ".*") {
        let sql = Template::parse("{{ bool(v) }}").unwrap()
            .render(&params! { "v" => text.as_str() }, &PostgresDialect).unwrap();
        let truthy = !(text.is_empty() || text == "0");
        prop_assert_eq!(sql, if truthy { "true" } else { "false" });
    }

    #[test]
    fn scheduled_transaction_tracks_nesting(steps in prop::collection::vec(step(), 0..40)) {
        let mut state = TransactionState::new();
        let mut depth = 0u32;
        for step in steps {
            match step {
                Step::Start => {
                    state.start();
                    depth += 1;
                }
                Step::Accept => {
                    state.accept();
                    depth = depth.saturating_sub(1);
                }
                Step::Cancel => {
                    state.cancel();
                    depth = 0;
                }
            }
            prop_assert_eq!(state.depth(), depth);
            let expected = if depth == 0 { TxPhase::None } else { TxPhase::Scheduled };
            prop_assert_eq!(state.phase(), expected);
        }
    }
}

#[cfg(feature = "redis")]
proptest! {
    #[test]
    fn redis_literals_split_back_to_input(text in ".*") {
        let line = format!("SET key {}", RedisDialect.quote_literal(&text));
        let args = store_middleware::redis::split_args(&line).unwrap();
        prop_assert_eq!(args.len(), 3);
        prop_assert_eq!(&args[2], &text.into_bytes());
    }
}

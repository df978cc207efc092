//! Tests for remote-to-local type mapping

use rstest::rstest;
use snowcopy_core::{ColumnDescriptor, LocalColumnSpec, LocalType, SinkFlavor};

use super::type_mapper::*;

mod numeric_params_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_precision_and_scale() {
        let params = NumericParams::parse("NUMBER(10,2)");
        assert_eq!(params.precision, Some(10));
        assert_eq!(params.scale, Some(2));
        assert!(params.has_scale_marker);
        assert!(params.is_fractional());
    }

    #[test]
    fn test_zero_scale_is_not_fractional() {
        let params = NumericParams::parse("NUMBER(38, 0)");
        assert_eq!(params.scale, Some(0));
        assert!(params.has_scale_marker);
        assert!(!params.is_fractional());
    }

    #[test]
    fn test_no_parameters() {
        assert_eq!(NumericParams::parse("NUMBER"), NumericParams::default());
        assert_eq!(NumericParams::parse("NUMBER)("), NumericParams::default());
    }

    #[test]
    fn test_precision_beyond_u32_is_unreadable() {
        let params = NumericParams::parse("NUMBER(99999999999999999999,0)");
        assert_eq!(params.precision, None);
        assert!(params.precision_unreadable);
        assert!(!params.is_fractional());
        assert!(!NumericParams::parse("NUMBER(38,0)").precision_unreadable);
    }

    #[test]
    fn test_unparsable_scale_counts_as_fractional() {
        let params = NumericParams::parse("NUMBER(10,x)");
        assert_eq!(params.scale, None);
        assert!(params.is_fractional());
    }
}

mod map_type_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapper() -> TypeMapper {
        TypeMapper::new(SinkFlavor::Sqlite)
    }

    #[rstest]
    #[case("VARCHAR(100)", LocalType::Text)]
    #[case("TEXT", LocalType::Text)]
    #[case("CHAR(1)", LocalType::Text)]
    #[case("STRING", LocalType::Text)]
    #[case("NUMBER(10,2)", LocalType::Real)]
    #[case("DECIMAL(12,4)", LocalType::Real)]
    #[case("NUMBER(10,0)", LocalType::Integer)]
    #[case("NUMBER(18,0)", LocalType::Integer)]
    #[case("NUMBER", LocalType::Integer)]
    #[case("NUMERIC(9)", LocalType::Integer)]
    #[case("BIGINT", LocalType::Integer)]
    #[case("FLOAT", LocalType::Real)]
    #[case("DOUBLE PRECISION", LocalType::Real)]
    #[case("REAL", LocalType::Real)]
    #[case("TIMESTAMP_NTZ(9)", LocalType::DateTime)]
    #[case("TIMESTAMP_TZ", LocalType::DateTime)]
    #[case("DATETIME", LocalType::DateTime)]
    #[case("DATE", LocalType::Date)]
    #[case("BOOLEAN", LocalType::Boolean)]
    fn test_known_types(#[case] remote_type: &str, #[case] expected: LocalType) {
        let mapping = mapper().resolve(remote_type);
        assert_eq!(mapping.local_type, expected);
        assert!(!mapping.is_fallback);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(mapper().map_type("  varchar(16777216) "), LocalType::Text);
        assert_eq!(mapper().map_type("number(10,2)"), LocalType::Real);
    }

    #[test]
    fn test_text_wins_over_later_families() {
        // "DATE" appears inside the name, but the text check runs first
        assert_eq!(mapper().map_type("VARCHAR_DATE"), LocalType::Text);
        assert_eq!(mapper().map_type("TEXT_NUMBER"), LocalType::Text);
    }

    #[test]
    fn test_timestamp_wins_over_date() {
        assert_eq!(mapper().map_type("DATETIME"), LocalType::DateTime);
    }

    #[rstest]
    #[case("VARIANT")]
    #[case("OBJECT")]
    #[case("ARRAY")]
    #[case("GEOGRAPHY")]
    #[case("TIME")]
    #[case("")]
    #[case("(,)")]
    #[case("NUMBE")]
    fn test_unknown_types_fall_back_to_text(#[case] remote_type: &str) {
        let mapping = mapper().resolve(remote_type);
        assert_eq!(mapping.local_type, LocalType::Text);
        assert!(mapping.is_fallback);
    }

    #[test]
    fn test_mapping_is_total_and_deterministic() {
        let inputs = [
            "", " ", "(", ")", "((", "NUMBER(", "NUMBER)", "NUMBER(,", "NUMBER(99999999999999999999,1)",
            "DECIMAL(-1,-1)", "ÜBER", "日付", "\0", "NUMBER(38,0)(1,2)", "BOOLEAN[]",
        ];
        let mapper = mapper();
        for input in inputs {
            let first = mapper.resolve(input);
            assert_eq!(first, mapper.resolve(input), "{:?}", input);
        }
    }
}

mod large_integer_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wide_integers_default_to_text() {
        let mapper = TypeMapper::new(SinkFlavor::DuckDb);
        assert_eq!(mapper.large_integer_policy(), LargeIntegerPolicy::Text);
        assert_eq!(mapper.map_type("NUMBER(38,0)"), LocalType::Text);
        assert_eq!(mapper.map_type("NUMBER(19)"), LocalType::Text);
        assert!(!mapper.resolve("NUMBER(38,0)").is_fallback);
    }

    #[test]
    fn test_integer_policy_keeps_integer() {
        let mapper =
            TypeMapper::new(SinkFlavor::Sqlite).with_large_integer_policy(LargeIntegerPolicy::Integer);
        assert_eq!(mapper.map_type("NUMBER(38,0)"), LocalType::Integer);
    }

    #[test]
    fn test_custom_precision_limit() {
        let mapper = TypeMapper::new(SinkFlavor::Sqlite).with_integer_precision_limit(38);
        assert_eq!(mapper.map_type("NUMBER(38,0)"), LocalType::Integer);
        let mapper = TypeMapper::new(SinkFlavor::Sqlite).with_integer_precision_limit(9);
        assert_eq!(mapper.map_type("NUMBER(10,0)"), LocalType::Text);
    }

    #[test]
    fn test_unreadable_precision_follows_policy() {
        let text = TypeMapper::new(SinkFlavor::Sqlite);
        assert_eq!(text.map_type("NUMBER(99999999999999999999,0)"), LocalType::Text);
        assert_eq!(text.map_type("NUMBER(abc)"), LocalType::Text);

        let integer = text.with_large_integer_policy(LargeIntegerPolicy::Integer);
        assert_eq!(integer.map_type("NUMBER(99999999999999999999,0)"), LocalType::Integer);
    }

    #[test]
    fn test_scaled_wide_numbers_stay_real() {
        let mapper = TypeMapper::new(SinkFlavor::Sqlite);
        assert_eq!(mapper.map_type("NUMBER(38,2)"), LocalType::Real);
    }

    #[test]
    fn test_policy_deserializes_snake_case() {
        let policy: LargeIntegerPolicy = serde_json::from_str(r#""integer""#).unwrap();
        assert_eq!(policy, LargeIntegerPolicy::Integer);
    }
}

mod declaration_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case::sqlite(SinkFlavor::Sqlite, ["INTEGER", "TEXT", "DATETIME", "BOOLEAN", "REAL", "DATE"])]
    #[case::duckdb(SinkFlavor::DuckDb, ["BIGINT", "VARCHAR", "TIMESTAMP", "BOOLEAN", "DOUBLE", "DATE"])]
    fn test_vocabulary_per_flavor(#[case] flavor: SinkFlavor, #[case] expected: [&str; 6]) {
        let mapper = TypeMapper::new(flavor);
        let declared: Vec<&str> = [
            "NUMBER(10,0)",
            "VARCHAR(100)",
            "TIMESTAMP_NTZ",
            "BOOLEAN",
            "FLOAT",
            "DATE",
        ]
        .iter()
        .map(|t| mapper.declaration(t))
        .collect();
        assert_eq!(declared, expected.to_vec());
    }

    #[test]
    fn test_map_schema_keeps_order_and_names() {
        let columns = vec![
            ColumnDescriptor::new("ID", "NUMBER(10,0)").unwrap(),
            ColumnDescriptor::new("NAME", "VARCHAR(100)").unwrap(),
            ColumnDescriptor::new("PAYLOAD", "VARIANT").unwrap(),
            ColumnDescriptor::new("SIGNUP", "TIMESTAMP_NTZ").unwrap(),
        ];
        let schema = TypeMapper::new(SinkFlavor::Sqlite).map_schema(&columns);
        assert_eq!(
            schema,
            vec![
                LocalColumnSpec { name: "ID".into(), local_type: LocalType::Integer },
                LocalColumnSpec { name: "NAME".into(), local_type: LocalType::Text },
                LocalColumnSpec { name: "PAYLOAD".into(), local_type: LocalType::Text },
                LocalColumnSpec { name: "SIGNUP".into(), local_type: LocalType::DateTime },
            ]
        );
    }
}

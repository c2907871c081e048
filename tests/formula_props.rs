use buildstat::entity::ItemData;
use buildstat::formula::{analyze_formula_references, check, evaluate, validate_formula_syntax};
use buildstat::*;
use proptest::prelude::*;
use std::collections::HashMap;

fn scope() -> HashMap<String, f64> {
    HashMap::from([("level".to_string(), 12.0), ("vit".to_string(), 150.0)])
}

proptest! {
    #[test]
    fn evaluate_never_panics(formula in "\\PC{0,40}") {
        let value = evaluate(&formula, &scope());
        prop_assert!(value.is_finite());
        let _ = check(&formula, &scope());
        let _ = analyze_formula_references(&formula);
    }

    #[test]
    fn nested_input_never_panics(
        depth in 0usize..20_000,
        prefix in "[-+!(]{0,4}",
        inner in "[0-9a-z+*-]{0,6}",
        balanced in any::<bool>(),
    ) {
        let close = if balanced { ")".repeat(depth) } else { String::new() };
        let formula = format!("{}{}{}{}", prefix.repeat(depth / 4), "(".repeat(depth), inner, close);
        prop_assert!(evaluate(&formula, &scope()).is_finite());
        let _ = check(&formula, &scope());
        let _ = validate_formula_syntax(&formula);
    }

    #[test]
    fn operator_soup_never_panics(formula in "[0-9a-z_ ()+*/%!<>=&|?:.-]{0,40}") {
        prop_assert!(evaluate(&formula, &scope()).is_finite());
    }

    #[test]
    fn integer_arithmetic(a in -1000i32..1000, b in -1000i32..1000, c in 1i32..50) {
        let formula = format!("{} + {} * {} - ({} % {})", a, b, c, a, c);
        let expected = f64::from(a) + f64::from(b) * f64::from(c) - f64::from(a % c);
        prop_assert_eq!(evaluate(&formula, &scope()), expected);
        prop_assert!(validate_formula_syntax(&formula));
    }

    #[test]
    fn comparisons_match_rust(a in -100i32..100, b in -100i32..100) {
        prop_assert_eq!(check(&format!("{} < {}", a, b), &scope()), a < b);
        prop_assert_eq!(check(&format!("{} === {}", a, b), &scope()), a == b);
        let ternary = evaluate(&format!("{} >= {} ? 1 : 2", a, b), &scope());
        prop_assert_eq!(ternary, if a >= b { 1.0 } else { 2.0 });
    }

    #[test]
    fn resolution_is_deterministic(flats in prop::collection::vec(-50i32..200, 0..8), pct in 0i32..100) {
        let mut plate = Entity::item("plate", "Plate", ItemData::new("armor"))
            .with_modifier(Modifier::new("pct", ModifierKind::PercentAdd, "vit", pct.to_string()));
        for (i, f) in flats.iter().enumerate() {
            plate = plate.with_modifier(Modifier::flat(format!("f{}", i), "vit", f.to_string()));
        }
        let catalogue = Catalogue::new(
            vec![StatDefinition::new("vit", 100.0), StatDefinition::new("dmg", 0.0)],
            vec![plate.with_modifier(Modifier::flat("d", "dmg", "vit / 10"))],
        ).unwrap();
        let mut selection = PlayerSelection::new();
        selection.equipment.insert("armor".into(), "plate".into());

        let engine = Engine::new();
        let first = engine.calculate(&catalogue, &selection);
        let second = engine.calculate(&catalogue, &selection);
        prop_assert_eq!(&first.stats, &second.stats);
        prop_assert_eq!(&first.modifier_results, &second.modifier_results);

        let flat: f64 = flats.iter().map(|f| f64::from(*f)).sum();
        let raw = (100.0 + flat) * (1.0 + f64::from(pct) / 100.0);
        prop_assert_eq!(first.final_value("vit"), buildstat::stat_def::round_stat(raw, None));
    }

    #[test]
    fn adding_flat_never_lowers_stat(bonus in 0u32..500) {
        let stats = vec![StatDefinition::new("vit", 100.0)];
        let plate = Entity::item("plate", "Plate", ItemData::new("armor"))
            .with_modifier(Modifier::new("pct", ModifierKind::PercentAdd, "vit", "15"))
            .with_modifier(Modifier::flat("bonus", "vit", bonus.to_string()));
        let mut selection = PlayerSelection::new();
        let bare = resolve_pass(&stats, std::slice::from_ref(&plate), &selection, &[]);
        selection.equipment.insert("armor".into(), "plate".into());
        let worn = resolve_pass(&stats, std::slice::from_ref(&plate), &selection, &[]);
        prop_assert!(worn.final_value("vit") >= bare.final_value("vit"));
    }
}

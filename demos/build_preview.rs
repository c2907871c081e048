//! Build Preview Example
//!
//! A small knight build resolved end to end:
//! - Race, class and equipment modifiers
//! - A forged weapon (virtual entity processor)
//! - A toggle-gated buff
//! - An equip preview for a candidate helmet
//! - Catalogue linting

use buildstat::diagnostics::lint_catalogue;
use buildstat::entity::{ItemData, Modifier, ModifierKind};
use buildstat::preview::preview_item;
use buildstat::selection::WeaponUpgrade;
use buildstat::*;

fn catalogue() -> Catalogue {
    let stats = vec![
        StatDefinition::new("vit", 500.0),
        StatDefinition::new("spd", 20.0),
        StatDefinition::new("dmg", 0.0),
    ];

    let entities = vec![
        Entity::new("dwarf", EntityKind::Race, "Dwarf")
            .with_modifier(Modifier::flat("dwarf_vit", "vit", "level * 20")),
        Entity::new("knight", EntityKind::Class, "Knight")
            .with_modifier(Modifier::new("knight_vit", ModifierKind::PercentAdd, "vit", "15"))
            .with_modifier(
                Modifier::new("knight_rage", ModifierKind::PercentAdd, "dmg", "25").toggled("rage"),
            ),
        Entity::item("axe", "Battle Axe", ItemData::new("weapon"))
            .with_modifier(Modifier::flat("axe_dmg", "dmg", "80"))
            .with_modifier(Modifier::flat("axe_spd", "spd", "-2")),
        Entity::item("plate", "Plate Armor", ItemData::new("armor"))
            .with_modifier(Modifier::flat("plate_vit", "vit", "150"))
            .with_modifier(Modifier::flat("plate_dmg", "dmg", "vit / 50")),
        Entity::item("crown", "Iron Crown", ItemData::new("helmet"))
            .with_modifier(Modifier::flat("crown_vit", "vit", "60"))
            .with_modifier(Modifier::flat("crown_spd", "spd", "1")),
    ];

    match Catalogue::new(stats, entities) {
        Ok(catalogue) => catalogue,
        Err(err) => panic!("invalid demo catalogue: {}", err),
    }
}

fn main() {
    let catalogue = catalogue();

    println!("=== Lint ===");
    let issues = lint_catalogue(&catalogue);
    if issues.is_empty() {
        println!("no issues");
    }
    for issue in &issues {
        println!("{}", issue);
    }

    let mut selection = PlayerSelection::new();
    selection.level = 10;
    selection.race_id = Some("dwarf".into());
    selection.class_id = Some("knight".into());
    selection.weapons = vec![Some("axe".into())];
    selection.equipment.insert("armor".into(), "plate".into());
    selection.toggles.insert("rage".into(), true);
    selection.weapon_upgrades.insert(
        0,
        WeaponUpgrade {
            damage_level: 3,
            vitality_level: 1,
        },
    );

    let engine = Engine::new();
    let result = engine.calculate(&catalogue, &selection);

    println!("\n=== Stats ===");
    for (key, stat) in &result.stats {
        println!("{:>4}: {}", key, stat.final_value);
    }

    println!("\n=== dmg trace ===");
    if let Some(dmg) = result.stats.get("dmg") {
        for line in &dmg.logs {
            println!("  {}", line);
        }
    }

    println!("\n=== Virtual entities ===");
    for entity in result.final_entities.iter().filter(|e| e.id.contains("_upgraded_")) {
        println!("  {} ({})", entity.id, entity.name);
    }

    println!("\n=== Preview: Iron Crown in helmet ===");
    for delta in preview_item(&engine, &catalogue, &selection, "helmet", "crown") {
        println!(
            "{:>4}: {} -> {} ({:+})",
            delta.key, delta.before, delta.after, delta.delta
        );
    }
}

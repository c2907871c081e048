//! Built-in virtual entity processors.

pub mod forge;
pub mod mount_boost;
pub mod natural_strength;
pub mod secret_card;

pub use forge::WeaponForge;
pub use mount_boost::MountBoost;
pub use natural_strength::NaturalStrength;
pub use secret_card::SecretCard;

use crate::config::EngineConfig;
use crate::processor::VirtualEntityProcessor;

/// The standard chain: forge, secret card, natural strength, mount boost.
///
/// Order matters: the secret card boosts whatever the forge left in the
/// target slot.
pub fn default_processors(config: &EngineConfig) -> Vec<Box<dyn VirtualEntityProcessor>> {
    vec![
        Box::new(WeaponForge),
        Box::new(SecretCard::new(config.secret_card_marker.as_str())),
        Box::new(NaturalStrength::new(
            config.natural_strength_specialization.as_str(),
        )),
        Box::new(MountBoost::new(
            config.mount_boost_accessory.as_str(),
            config.mount_boost_factor,
        )),
    ]
}

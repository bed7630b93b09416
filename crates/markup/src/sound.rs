use std::collections::HashSet;

const BUILTIN_SOUNDS: &[&str] = &[
	"AMBIENT_CAVE",
	"BLOCK_ANVIL_LAND",
	"BLOCK_ANVIL_USE",
	"BLOCK_BEACON_ACTIVATE",
	"BLOCK_BEACON_DEACTIVATE",
	"BLOCK_BELL_USE",
	"BLOCK_CHEST_CLOSE",
	"BLOCK_CHEST_OPEN",
	"BLOCK_NOTE_BLOCK_BASEDRUM",
	"BLOCK_NOTE_BLOCK_BASS",
	"BLOCK_NOTE_BLOCK_BELL",
	"BLOCK_NOTE_BLOCK_CHIME",
	"BLOCK_NOTE_BLOCK_HARP",
	"BLOCK_NOTE_BLOCK_HAT",
	"BLOCK_NOTE_BLOCK_PLING",
	"BLOCK_NOTE_BLOCK_SNARE",
	"BLOCK_NOTE_BLOCK_XYLOPHONE",
	"BLOCK_PORTAL_TRAVEL",
	"CLICK",
	"ENTITY_ENDERMAN_TELEPORT",
	"ENTITY_ENDER_DRAGON_GROWL",
	"ENTITY_EXPERIENCE_ORB_PICKUP",
	"ENTITY_FIREWORK_ROCKET_BLAST",
	"ENTITY_FIREWORK_ROCKET_LAUNCH",
	"ENTITY_FIREWORK_ROCKET_TWINKLE",
	"ENTITY_GENERIC_EXPLODE",
	"ENTITY_ITEM_PICKUP",
	"ENTITY_LIGHTNING_BOLT_THUNDER",
	"ENTITY_PLAYER_LEVELUP",
	"ENTITY_VILLAGER_NO",
	"ENTITY_VILLAGER_YES",
	"ENTITY_WITHER_SPAWN",
	"ITEM_TOTEM_USE",
	"UI_BUTTON_CLICK",
	"UI_TOAST_CHALLENGE_COMPLETE",
	"UI_TOAST_IN",
	"UI_TOAST_OUT",
];

/// Set of sound identifiers the sound tag accepts.
///
/// Names are stored upper-cased; lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct SoundCatalog {
	names: HashSet<String>,
}

impl SoundCatalog {
	pub fn builtin() -> Self {
		Self {
			names: BUILTIN_SOUNDS.iter().map(|s| (*s).to_string()).collect(),
		}
	}

	/// Built-in names plus host-specific extras.
	pub fn with_extra<I, S>(extra: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut catalog = Self::builtin();
		for name in extra {
			catalog.insert(name);
		}
		catalog
	}

	pub fn insert(&mut self, name: impl AsRef<str>) {
		let name = name.as_ref().trim();
		if !name.is_empty() {
			self.names.insert(name.to_ascii_uppercase());
		}
	}

	pub fn contains(&self, name: &str) -> bool {
		self.names.contains(&name.to_ascii_uppercase())
	}

	pub fn len(&self) -> usize {
		self.names.len()
	}

	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}
}

impl Default for SoundCatalog {
	fn default() -> Self {
		Self::builtin()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lookups_ignore_case() {
		let catalog = SoundCatalog::builtin();
		assert!(catalog.contains("click"));
		assert!(catalog.contains("UI_BUTTON_CLICK"));
		assert!(!catalog.contains("NOT_A_SOUND"));
	}

	#[test]
	fn extras_extend_builtin_set() {
		let catalog = SoundCatalog::with_extra(["my_custom_sound", "  "]);
		assert!(catalog.contains("MY_CUSTOM_SOUND"));
		assert_eq!(catalog.len(), SoundCatalog::builtin().len() + 1);
	}
}

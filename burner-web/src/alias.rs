use rand::{Rng, seq::IndexedRandom};

const WORDS: &[&str] = &[
    "amber", "anchor", "aspen", "badger", "basil", "beacon", "birch", "bramble", "canyon",
    "cedar", "cinder", "clover", "comet", "coral", "cricket", "dune", "ember", "falcon", "fennel",
    "fjord", "garnet", "glacier", "harbor", "hazel", "heron", "indigo", "juniper", "kestrel",
    "lagoon", "lantern", "maple", "meadow", "nectar", "nimbus", "oasis", "otter", "pebble",
    "quartz", "quill", "raven", "saffron", "sparrow", "thistle", "tundra", "umber", "walnut",
    "willow", "yarrow", "zephyr",
];

/// Produces the placeholder alias suggested to visitors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AliasGenerator {
    random: bool,
}

impl AliasGenerator {
    pub const fn new(random: bool) -> Self {
        Self { random }
    }

    /// A lowercase alphanumeric alias, or `alias` when randomness is off.
    pub fn generate(&self) -> String {
        if !self.random {
            return "alias".to_string();
        }

        let mut rng = rand::rng();
        let word = WORDS.choose(&mut rng).copied().unwrap_or("alias");
        format!("{word}{}", rng.random_range(10..1000))
    }
}

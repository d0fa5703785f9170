//! Single- and multi-animal behavior contexts.
//!
//! A [`BehaviorContext`] tells the tagger which animals to tag on their own,
//! which pairs to tag together, and how to name the resulting columns. The
//! tagger runs the same detector invocation for both variants and never
//! branches on the number of animals.

use std::fmt;

use ethotrack_core::AnimalId;

/// Wall climbing
pub const CLIMBING: &str = "climbing";
/// Wall sniffing
pub const SNIFFING: &str = "sniffing";
/// Hunched and still
pub const HUDDLE: &str = "huddle";
/// Still with the nose hidden
pub const DIG: &str = "dig";
/// Still body, moving nose
pub const LOOKAROUND: &str = "lookaround";
/// Median body-part speed
pub const SPEED: &str = "speed";
/// Noses touching
pub const NOSE2NOSE: &str = "nose2nose";
/// Side by side, heads together
pub const SIDEBYSIDE: &str = "sidebyside";
/// Side by side, head to tail
pub const SIDERESIDE: &str = "sidereside";
/// Nose at the other animal's tail base
pub const NOSE2TAIL: &str = "nose2tail";
/// Nose at the other animal's body
pub const NOSE2BODY: &str = "nose2body";
/// Tracking the other animal's path
pub const FOLLOWING: &str = "following";

/// Traits computed for each subject, in overlay priority order.
pub const SUBJECT_TRAITS: [&str; 5] = [CLIMBING, HUDDLE, SNIFFING, DIG, LOOKAROUND];

/// Symmetric pair traits.
pub const SYMMETRIC_TRAITS: [&str; 3] = [NOSE2NOSE, SIDEBYSIDE, SIDERESIDE];

/// Directed pair traits, read as "first animal does X to second".
pub const DIRECTED_TRAITS: [&str; 3] = [NOSE2TAIL, NOSE2BODY, FOLLOWING];

/// Animals and pairs a video is tagged for.
pub trait BehaviorContext: Send + Sync + fmt::Debug {
    /// Animals tagged individually. `None` is the unnamed animal of a
    /// single-animal table.
    fn subjects(&self) -> Vec<Option<AnimalId>>;

    /// Unordered pairs of animals tagged for social traits.
    fn pairs(&self) -> Vec<(AnimalId, AnimalId)>;

    /// Column holding `trait_name` for `subject`.
    fn subject_column(&self, subject: Option<&AnimalId>, trait_name: &str) -> String;

    /// Column holding a pair trait. Directed traits read `first` to `second`.
    fn pair_column(&self, first: &AnimalId, second: &AnimalId, trait_name: &str) -> String {
        format!("{first}_{second}_{trait_name}")
    }
}

/// One animal, optionally named.
#[derive(Debug, Clone, Default)]
pub struct SingleAnimalContext {
    animal: Option<AnimalId>,
}

impl SingleAnimalContext {
    /// Context for a single animal.
    pub fn new(animal: Option<AnimalId>) -> Self {
        Self { animal }
    }
}

impl BehaviorContext for SingleAnimalContext {
    fn subjects(&self) -> Vec<Option<AnimalId>> {
        vec![self.animal.clone()]
    }

    fn pairs(&self) -> Vec<(AnimalId, AnimalId)> {
        Vec::new()
    }

    fn subject_column(&self, subject: Option<&AnimalId>, trait_name: &str) -> String {
        match subject {
            Some(id) => format!("{id}_{trait_name}"),
            None => trait_name.to_string(),
        }
    }
}

/// Two or more animals sharing the arena.
#[derive(Debug, Clone)]
pub struct MultiAnimalContext {
    animals: Vec<AnimalId>,
}

impl MultiAnimalContext {
    /// Context for `animals`, in the given order.
    pub fn new(animals: Vec<AnimalId>) -> Self {
        Self { animals }
    }
}

impl BehaviorContext for MultiAnimalContext {
    fn subjects(&self) -> Vec<Option<AnimalId>> {
        self.animals.iter().cloned().map(Some).collect()
    }

    fn pairs(&self) -> Vec<(AnimalId, AnimalId)> {
        self.animals
            .iter()
            .enumerate()
            .flat_map(|(i, a)| self.animals[i + 1..].iter().map(move |b| (a.clone(), b.clone())))
            .collect()
    }

    fn subject_column(&self, subject: Option<&AnimalId>, trait_name: &str) -> String {
        match subject {
            Some(id) => format!("{id}_{trait_name}"),
            None => trait_name.to_string(),
        }
    }
}

/// Context matching a list of animal identifiers.
#[must_use]
pub fn context_for(animal_ids: &[AnimalId]) -> Box<dyn BehaviorContext> {
    match animal_ids {
        [] => Box::new(SingleAnimalContext::new(None)),
        [only] => Box::new(SingleAnimalContext::new(Some(only.clone()))),
        many => Box::new(MultiAnimalContext::new(many.to_vec())),
    }
}

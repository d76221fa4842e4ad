use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use enumset::{EnumSet, EnumSetType};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{core::period::Period, prelude::*, quantity::power::Watts};

/// Operating mode of the energy storage.
#[derive(Debug, Hash, EnumSetType, Serialize, Deserialize)]
#[enumset(serialize_repr = "list")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryMode {
    /// Charge on excess production, discharge on excess consumption.
    Balancing,

    /// Charge on excess production but never discharge.
    DelayDischarge,

    /// Additionally charge from the grid up to the maximum grid-charge energy.
    ChargeGrid,
}

impl BatteryMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Balancing => "BALANCING",
            Self::DelayDischarge => "DELAY_DISCHARGE",
            Self::ChargeGrid => "CHARGE_GRID",
        }
    }

    pub const fn color(self) -> comfy_table::Color {
        match self {
            Self::Balancing => comfy_table::Color::DarkYellow,
            Self::DelayDischarge => comfy_table::Color::Cyan,
            Self::ChargeGrid => comfy_table::Color::Green,
        }
    }
}

impl Display for BatteryMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatteryMode {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        EnumSet::<Self>::all()
            .iter()
            .find(|mode| mode.as_str() == name)
            .with_context(|| format!("unknown battery mode `{name}`"))
    }
}

/// What choosing a mode does to the simulated energy flow.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModeEffect {
    Neutral,
    Battery(BatteryMode),

    /// Additional constant consumption while the mode is active.
    Load(Watts),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mode {
    pub name: String,
    pub effect: ModeEffect,
}

impl Mode {
    pub fn new(name: impl Into<String>, effect: ModeEffect) -> Self {
        Self { name: name.into(), effect }
    }
}

impl From<BatteryMode> for Mode {
    fn from(mode: BatteryMode) -> Self {
        Self::new(mode.as_str(), ModeEffect::Battery(mode))
    }
}

/// Per-period feasibility check of a handler mode.
pub type Feasibility = fn(&Period, &Mode) -> bool;

#[must_use]
#[derive(Clone, Debug, bon::Builder)]
pub struct DiscreteModes {
    pub modes: Vec<Mode>,

    #[builder(default)]
    pub default_index: usize,

    pub feasibility: Option<Feasibility>,
}

/// Modes a schedule handler offers to the optimizer.
#[derive(Clone, Debug)]
pub enum HandlerModes {
    Discrete(DiscreteModes),

    /// Participates in the schedule without any choice.
    Fixed,
}

impl HandlerModes {
    pub const FIXED_MODE_NAME: &'static str = "FIXED";

    /// Battery modes with [`BatteryMode::Balancing`] as the default.
    pub fn battery(modes: EnumSet<BatteryMode>) -> Self {
        let modes = (modes | BatteryMode::Balancing).iter().map(Mode::from).collect();
        Self::Discrete(DiscreteModes::builder().modes(modes).build())
    }

    pub fn n_modes(&self) -> usize {
        match self {
            Self::Discrete(discrete) => discrete.modes.len(),
            Self::Fixed => 1,
        }
    }

    pub const fn default_index(&self) -> usize {
        match self {
            Self::Discrete(discrete) => discrete.default_index,
            Self::Fixed => 0,
        }
    }

    pub fn mode(&self, index: usize) -> Option<&Mode> {
        match self {
            Self::Discrete(discrete) => discrete.modes.get(index),
            Self::Fixed => None,
        }
    }

    pub fn mode_name(&self, index: usize) -> &str {
        self.mode(index).map_or(Self::FIXED_MODE_NAME, |mode| mode.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        match self {
            Self::Discrete(discrete) => discrete.modes.iter().position(|mode| mode.name == name),
            Self::Fixed => (name == Self::FIXED_MODE_NAME).then_some(0),
        }
    }

    /// Mode indices with the default one first.
    fn default_first(&self) -> Vec<usize> {
        let default_index = self.default_index();
        std::iter::once(default_index)
            .chain((0..self.n_modes()).filter(|index| *index != default_index))
            .collect()
    }

    fn is_feasible(&self, index: usize, period: &Period) -> bool {
        match self {
            Self::Discrete(DiscreteModes { modes, feasibility: Some(feasibility), .. }) => {
                modes.get(index).is_none_or(|mode| feasibility(period, mode))
            }
            _ => true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HandlerDescriptor {
    pub id: String,
    pub modes: HandlerModes,
}

/// Mode chosen for one handler, identified by names so it survives re-building the combinations.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AppliedMode {
    pub handler: String,
    pub mode: String,
}

/// Operator-declared set of handler modes that must not be active together.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ForbiddenCombination {
    pub modes: Vec<AppliedMode>,
}

/// One mode per handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeCombination {
    /// Mode index per handler, in the handler order.
    pub indices: Vec<usize>,

    pub battery: BatteryMode,

    /// Total additional consumption of the chosen modes.
    pub load: Watts,
}

/// All allowed mode combinations, index 0 is every handler's default.
#[derive(Clone, Debug)]
pub struct ModeCombinations {
    handlers: Vec<HandlerDescriptor>,
    combinations: Vec<ModeCombination>,
}

impl ModeCombinations {
    #[instrument(skip_all)]
    pub fn build(handlers: Vec<HandlerDescriptor>, forbidden: &[ForbiddenCombination]) -> Self {
        let combinations = handlers
            .iter()
            .map(|handler| handler.modes.default_first())
            .multi_cartesian_product()
            .collect_vec();
        let combinations = if combinations.is_empty() { vec![Vec::new()] } else { combinations };

        let mut this = Self { handlers, combinations: Vec::with_capacity(combinations.len()) };
        for (i, indices) in combinations.into_iter().enumerate() {
            if i != 0 && forbidden.iter().any(|rule| this.matches(&indices, &rule.modes)) {
                debug!(?indices, "skipping the forbidden combination");
                continue;
            }
            let combination = this.resolve(indices);
            this.combinations.push(combination);
        }
        debug!(
            n_handlers = this.handlers.len(),
            n_combinations = this.combinations.len(),
            "built mode combinations",
        );
        this
    }

    fn resolve(&self, indices: Vec<usize>) -> ModeCombination {
        let mut battery = BatteryMode::Balancing;
        let mut load = Watts::ZERO;
        for mode in self.handlers.iter().zip(&indices).filter_map(|(h, i)| h.modes.mode(*i)) {
            match mode.effect {
                ModeEffect::Neutral => {}
                ModeEffect::Battery(mode) => battery = mode,
                ModeEffect::Load(power) => load += power,
            }
        }
        ModeCombination { indices, battery, load }
    }

    /// Check whether the combination activates every one of the modes.
    fn matches(&self, indices: &[usize], modes: &[AppliedMode]) -> bool {
        modes.iter().all(|applied| {
            self.handlers.iter().zip(indices).any(|(handler, index)| {
                handler.id == applied.handler && handler.modes.mode_name(*index) == applied.mode
            })
        })
    }

    pub const fn len(&self) -> usize {
        self.combinations.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn handlers(&self) -> &[HandlerDescriptor] {
        &self.handlers
    }

    /// Get the combination, falling back to the default on an out-of-range index.
    pub fn get(&self, index: usize) -> &ModeCombination {
        self.combinations.get(index).unwrap_or(&self.combinations[0])
    }

    pub fn applied_modes(&self, index: usize) -> Vec<AppliedMode> {
        self.handlers
            .iter()
            .zip(&self.get(index).indices)
            .map(|(handler, mode_index)| AppliedMode {
                handler: handler.id.clone(),
                mode: handler.modes.mode_name(*mode_index).to_owned(),
            })
            .collect()
    }

    /// Applied modes with the battery handler's mode substituted.
    ///
    /// The substitution only happens when the battery handler offers the mode.
    pub fn applied_modes_with_battery(&self, index: usize, battery: BatteryMode) -> Vec<AppliedMode> {
        let mut applied = self.applied_modes(index);
        let indices = &self.get(index).indices;
        for ((handler, mode_index), applied) in self.handlers.iter().zip(indices).zip(&mut applied) {
            let is_battery = matches!(
                handler.modes.mode(*mode_index),
                Some(Mode { effect: ModeEffect::Battery(_), .. })
            );
            if is_battery && handler.modes.position(battery.as_str()).is_some() {
                battery.as_str().clone_into(&mut applied.mode);
            }
        }
        applied
    }

    /// Find the combination that activates the same mode for every handler.
    ///
    /// Handlers missing from `modes` must be in their default mode.
    pub fn find_equivalent(&self, modes: &[AppliedMode]) -> Option<usize> {
        self.combinations.iter().position(|combination| {
            self.handlers.iter().zip(&combination.indices).all(|(handler, index)| {
                modes.iter().find(|applied| applied.handler == handler.id).map_or_else(
                    || *index == handler.modes.default_index(),
                    |applied| handler.modes.mode_name(*index) == applied.mode,
                )
            })
        })
    }

    /// Find the combination with the battery mode and every other handler in its default mode.
    pub fn find_battery_mode(&self, mode: BatteryMode) -> Option<usize> {
        self.combinations.iter().position(|combination| {
            combination.battery == mode
                && self.handlers.iter().zip(&combination.indices).all(|(handler, index)| {
                    *index == handler.modes.default_index()
                        || matches!(
                            handler.modes.mode(*index),
                            Some(Mode { effect: ModeEffect::Battery(_), .. })
                        )
                })
        })
    }

    pub fn is_feasible(&self, index: usize, period: &Period) -> bool {
        self.handlers
            .iter()
            .zip(&self.get(index).indices)
            .all(|(handler, mode_index)| handler.modes.is_feasible(*mode_index, period))
    }

    /// Number of handlers with an actual choice.
    pub fn n_choosing_handlers(&self) -> usize {
        self.handlers.iter().filter(|handler| handler.modes.n_modes() > 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ess(modes: EnumSet<BatteryMode>) -> HandlerDescriptor {
        HandlerDescriptor { id: "ess0".to_owned(), modes: HandlerModes::battery(modes) }
    }

    fn charger() -> HandlerDescriptor {
        HandlerDescriptor {
            id: "evcs0".to_owned(),
            modes: HandlerModes::Discrete(
                DiscreteModes::builder()
                    .modes(vec![
                        Mode::new("FORCE", ModeEffect::Load(Watts(11_000))),
                        Mode::new("SURPLUS", ModeEffect::Neutral),
                    ])
                    .default_index(1)
                    .build(),
            ),
        }
    }

    #[test]
    fn battery_mode_names() {
        assert_eq!("CHARGE_GRID".parse::<BatteryMode>().unwrap(), BatteryMode::ChargeGrid);
        assert_eq!(BatteryMode::DelayDischarge.to_string(), "DELAY_DISCHARGE");
        assert!("IDLE".parse::<BatteryMode>().is_err());
    }

    #[test]
    fn default_combination_first() {
        let combinations = ModeCombinations::build(vec![ess(EnumSet::all()), charger()], &[]);
        assert_eq!(combinations.len(), 6);
        assert_eq!(
            combinations.applied_modes(0),
            vec![
                AppliedMode { handler: "ess0".to_owned(), mode: "BALANCING".to_owned() },
                AppliedMode { handler: "evcs0".to_owned(), mode: "SURPLUS".to_owned() },
            ],
        );
        assert_eq!(combinations.get(0).battery, BatteryMode::Balancing);
        assert_eq!(combinations.get(0).load, Watts::ZERO);
    }

    #[test]
    fn forbidden_combinations_are_removed() {
        let forbidden = ForbiddenCombination {
            modes: vec![
                AppliedMode { handler: "ess0".to_owned(), mode: "CHARGE_GRID".to_owned() },
                AppliedMode { handler: "evcs0".to_owned(), mode: "FORCE".to_owned() },
            ],
        };
        let combinations = ModeCombinations::build(vec![ess(EnumSet::all()), charger()], &[forbidden]);
        assert_eq!(combinations.len(), 5);
        assert!(
            (0..combinations.len())
                .map(|index| combinations.get(index))
                .all(|combination| !(combination.battery == BatteryMode::ChargeGrid
                    && combination.load == Watts(11_000)))
        );
    }

    #[test]
    fn default_is_never_forbidden() {
        let forbidden = ForbiddenCombination {
            modes: vec![AppliedMode { handler: "ess0".to_owned(), mode: "BALANCING".to_owned() }],
        };
        let combinations = ModeCombinations::build(vec![ess(EnumSet::all())], &[forbidden]);
        assert_eq!(combinations.len(), 3);
        assert_eq!(combinations.get(0).battery, BatteryMode::Balancing);
    }

    #[test]
    fn no_handlers_yield_single_default() {
        let combinations = ModeCombinations::build(Vec::new(), &[]);
        assert_eq!(combinations.len(), 1);
        assert_eq!(combinations.get(0).battery, BatteryMode::Balancing);
    }

    #[test]
    fn find_equivalent_by_names() {
        let combinations = ModeCombinations::build(vec![ess(EnumSet::all()), charger()], &[]);
        let index = combinations
            .find_equivalent(&[AppliedMode { handler: "ess0".to_owned(), mode: "CHARGE_GRID".to_owned() }])
            .unwrap();
        assert_eq!(combinations.get(index).battery, BatteryMode::ChargeGrid);
        assert_eq!(combinations.get(index).load, Watts::ZERO);
        assert_eq!(
            combinations.find_equivalent(&[AppliedMode {
                handler: "ess0".to_owned(),
                mode: "DISCHARGE".to_owned(),
            }]),
            None,
        );
    }

    #[test]
    fn find_battery_mode_keeps_other_defaults() {
        let combinations = ModeCombinations::build(vec![ess(EnumSet::all()), charger()], &[]);
        let index = combinations.find_battery_mode(BatteryMode::DelayDischarge).unwrap();
        assert_eq!(combinations.get(index).load, Watts::ZERO);

        let restricted = ModeCombinations::build(vec![ess(BatteryMode::DelayDischarge.into())], &[]);
        assert_eq!(restricted.find_battery_mode(BatteryMode::ChargeGrid), None);
    }

    #[test]
    fn substitute_battery_mode() {
        let combinations = ModeCombinations::build(vec![ess(EnumSet::all()), charger()], &[]);
        let index = combinations.find_battery_mode(BatteryMode::ChargeGrid).unwrap();
        let applied = combinations.applied_modes_with_battery(index, BatteryMode::DelayDischarge);
        assert_eq!(applied[0].mode, "DELAY_DISCHARGE");
        assert_eq!(applied[1].mode, "SURPLUS");
    }

    #[test]
    fn fixed_handler() {
        let fixed = HandlerDescriptor { id: "meter0".to_owned(), modes: HandlerModes::Fixed };
        let combinations = ModeCombinations::build(vec![fixed, ess(EnumSet::all())], &[]);
        assert_eq!(combinations.len(), 3);
        assert_eq!(combinations.applied_modes(0)[0].mode, HandlerModes::FIXED_MODE_NAME);
        assert_eq!(combinations.n_choosing_handlers(), 1);
    }
}

//! Closed set of OAuth scopes understood by the Fitbit authorization endpoint.

// self
use crate::_prelude::*;

/// Errors emitted when parsing scope strings.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeParseError {
	/// The string does not name a known scope.
	#[error("Unknown Fitbit scope: {0}.")]
	Unknown(String),
}

/// Named permission grant requested during authorization.
///
/// The set is fixed by the provider; values serialize to the exact strings the
/// authorization endpoint expects and are passed through opaquely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
	/// Activity and exercise data.
	Activity,
	/// Breathing rate data.
	#[serde(rename = "respiratory_rate")]
	BreathingRate,
	/// Continuous heart-rate data.
	Heartrate,
	/// GPS and location data.
	Location,
	/// Nutrition logs.
	Nutrition,
	/// Profile information.
	Profile,
	/// Account and device settings.
	Settings,
	/// Sleep logs.
	Sleep,
	/// Friends and leaderboard data.
	Social,
	/// Blood oxygen saturation data.
	#[serde(rename = "oxygen_saturation")]
	SpO2,
	/// Skin temperature data.
	Temperature,
	/// Weight and body fat data.
	Weight,
}
impl Scope {
	/// All scopes the provider currently understands.
	pub const ALL: [Self; 12] = [
		Self::Activity,
		Self::BreathingRate,
		Self::Heartrate,
		Self::Location,
		Self::Nutrition,
		Self::Profile,
		Self::Settings,
		Self::Sleep,
		Self::Social,
		Self::SpO2,
		Self::Temperature,
		Self::Weight,
	];

	/// Returns the wire identifier for the scope.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Activity => "activity",
			Self::BreathingRate => "respiratory_rate",
			Self::Heartrate => "heartrate",
			Self::Location => "location",
			Self::Nutrition => "nutrition",
			Self::Profile => "profile",
			Self::Settings => "settings",
			Self::Sleep => "sleep",
			Self::Social => "social",
			Self::SpO2 => "oxygen_saturation",
			Self::Temperature => "temperature",
			Self::Weight => "weight",
		}
	}
}
impl Display for Scope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Scope {
	type Err = ScopeParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|scope| scope.as_str() == s)
			.ok_or_else(|| ScopeParseError::Unknown(s.to_owned()))
	}
}

/// Formats scopes as the space-delimited `scope` query value, `None` when empty.
pub(crate) fn format_scopes(scopes: &[Scope]) -> Option<String> {
	if scopes.is_empty() {
		return None;
	}

	Some(scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" "))
}

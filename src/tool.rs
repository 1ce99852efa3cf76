//! Toolchains that can be resolved and installed

/// A BEAM-ecosystem tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Erlang/OTP
    Otp,
    /// Elixir
    Elixir,
    /// Gleam
    Gleam,
    /// rebar3
    Rebar3,
}

impl Tool {
    /// Returns the string representation used for cache keys and install directories
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Otp => "otp",
            Tool::Elixir => "elixir",
            Tool::Gleam => "gleam",
            Tool::Rebar3 => "rebar3",
        }
    }

    /// Human-readable name for log and error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Tool::Otp => "Erlang/OTP",
            Tool::Elixir => "Elixir",
            Tool::Gleam => "Gleam",
            Tool::Rebar3 => "rebar3",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for Tool {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "otp" | "erlang" => Ok(Tool::Otp),
            "elixir" => Ok(Tool::Elixir),
            "gleam" => Ok(Tool::Gleam),
            "rebar3" | "rebar" => Ok(Tool::Rebar3),
            _ => Err(()),
        }
    }
}

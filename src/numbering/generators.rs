//! Built-in sequence policies.

use crate::contracts::{GeneratorDefinition, NumberGenerator, Period, SequenceNumber};

/// The built-in invoice number generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generator {
    /// One counter that never resets.
    Infinite,
    /// Resets when the year changes.
    Yearly,
    /// Resets when the month changes.
    Monthly,
    /// Moves to the new month but keeps counting.
    MonthlyNoReset,
}

impl Generator {
    pub const ALL: [Generator; 4] = [
        Generator::Infinite,
        Generator::Yearly,
        Generator::Monthly,
        Generator::MonthlyNoReset,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Generator::Infinite => "infinite",
            Generator::Yearly => "yearly",
            Generator::Monthly => "monthly",
            Generator::MonthlyNoReset => "monthly_no_reset",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Generator::Infinite => "Infinite",
            Generator::Yearly => "Yearly",
            Generator::Monthly => "Monthly",
            Generator::MonthlyNoReset => "Monthly no reset",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Generator::Infinite => {
                "One single number, that is never reset and incremented at each invoice number generation"
            }
            Generator::Yearly => {
                "Reset every year, with an ID incremented at each invoice number generation"
            }
            Generator::Monthly => {
                "Reset every month, with an ID incremented at each invoice number generation"
            }
            Generator::MonthlyNoReset => {
                "Increments the month, with an ID incremented at each invoice number generation"
            }
        }
    }

    pub fn definition(self) -> GeneratorDefinition {
        GeneratorDefinition::new(self.id(), self.label(), self.description())
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.id() == id)
    }

    /// Whether `last` can no longer be continued in `period`.
    fn rolled_over(self, last: &SequenceNumber, period: Period) -> bool {
        match self {
            Generator::Infinite => false,
            Generator::Yearly => last.year() != period.year,
            Generator::Monthly | Generator::MonthlyNoReset => last.period() != period,
        }
    }
}

impl NumberGenerator for Generator {
    fn generate(&self, last: Option<&SequenceNumber>, period: Period) -> SequenceNumber {
        let mut next = match last {
            None => SequenceNumber::fresh(period),
            Some(last) => match self {
                // never resets, but always reports the period it was issued in
                Generator::Infinite => last.carried_to(period),
                Generator::MonthlyNoReset if self.rolled_over(last, period) => {
                    last.carried_to(period)
                }
                _ if self.rolled_over(last, period) => SequenceNumber::fresh(period),
                _ => last.clone(),
            },
        };
        next.increment();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(year: i32, month: u32) -> Period {
        Period::new(year, month)
    }

    #[test]
    fn definitions_carry_labels_and_descriptions() {
        let definition = Generator::MonthlyNoReset.definition();
        assert_eq!(definition.label, "Monthly no reset");
        assert_eq!(
            definition.description,
            "Increments the month, with an ID incremented at each invoice number generation"
        );
        for generator in Generator::ALL {
            assert!(!generator.description().is_empty());
        }
    }

    #[test]
    fn first_call_starts_at_one_for_every_generator() {
        for generator in Generator::ALL {
            let next = generator.generate(None, at(2024, 3));
            assert_eq!(next, SequenceNumber::new(1, 2024, 3), "{}", generator.id());
        }
    }

    #[test]
    fn increments_are_gapless_within_a_period() {
        for generator in Generator::ALL {
            let mut last: Option<SequenceNumber> = None;
            for expected in 1..=50u64 {
                let next = generator.generate(last.as_ref(), at(2024, 6));
                assert_eq!(next.increment_number(), expected, "{}", generator.id());
                last = Some(next);
            }
        }
    }

    #[test]
    fn yearly_resets_on_new_year() {
        let last = SequenceNumber::new(5, 2023, 12);
        let next = Generator::Yearly.generate(Some(&last), at(2024, 1));
        assert_eq!(next, SequenceNumber::new(1, 2024, 1));
    }

    #[test]
    fn yearly_keeps_counting_across_months() {
        let last = SequenceNumber::new(5, 2024, 1);
        let next = Generator::Yearly.generate(Some(&last), at(2024, 7));
        assert_eq!(next.increment_number(), 6);
        // the stored period only moves on reset
        assert_eq!(next.period(), at(2024, 1));
    }

    #[test]
    fn monthly_resets_on_new_month() {
        let last = SequenceNumber::new(5, 2024, 1);
        let next = Generator::Monthly.generate(Some(&last), at(2024, 2));
        assert_eq!(next, SequenceNumber::new(1, 2024, 2));
    }

    #[test]
    fn monthly_resets_on_same_month_of_another_year() {
        let last = SequenceNumber::new(5, 2023, 2);
        let next = Generator::Monthly.generate(Some(&last), at(2024, 2));
        assert_eq!(next, SequenceNumber::new(1, 2024, 2));
    }

    #[test]
    fn infinite_carries_counter_and_updates_period() {
        let last = SequenceNumber::new(5, 2023, 1);
        let next = Generator::Infinite.generate(Some(&last), at(2025, 6));
        assert_eq!(next, SequenceNumber::new(6, 2025, 6));
    }

    #[test]
    fn monthly_no_reset_carries_counter_forward() {
        let last = SequenceNumber::new(5, 2024, 1);
        let next = Generator::MonthlyNoReset.generate(Some(&last), at(2024, 2));
        assert_eq!(next, SequenceNumber::new(6, 2024, 2));
    }

    #[test]
    fn monthly_no_reset_without_history_starts_fresh() {
        let next = Generator::MonthlyNoReset.generate(None, at(2024, 2));
        assert_eq!(next, SequenceNumber::new(1, 2024, 2));
    }

    #[test]
    fn last_is_not_mutated() {
        let last = SequenceNumber::new(5, 2024, 1);
        let _ = Generator::Monthly.generate(Some(&last), at(2024, 1));
        assert_eq!(last.increment_number(), 5);
    }

    #[test]
    fn ids_round_trip() {
        for generator in Generator::ALL {
            assert_eq!(Generator::from_id(generator.id()), Some(generator));
        }
        assert_eq!(Generator::from_id("weekly"), None);
    }
}

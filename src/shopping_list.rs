//! Aggregation of a user's shopping cart into a downloadable text list.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};

use crate::{
    constants::{
        SHOPPING_LIST_FOOTER, SHOPPING_LIST_SUFFIX, SHOPPING_LIST_TIMESTAMP, SHOPPING_LIST_TITLE,
    },
    database::schema::CartPart,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Sums amounts per (name, unit). Items come out ordered by name, then unit.
pub fn aggregate<I>(parts: I) -> Vec<ShoppingListItem>
where
    I: IntoIterator<Item = CartPart>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

    for part in parts {
        *totals
            .entry((part.name, part.measurement_unit))
            .or_insert(0) += i64::from(part.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListItem {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

pub fn render<Tz>(display_name: &str, generated_at: &DateTime<Tz>, items: &[ShoppingListItem]) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut s = format!(
        "{SHOPPING_LIST_TITLE} ({display_name})\n{}\n\n",
        generated_at.format(SHOPPING_LIST_TIMESTAMP)
    );

    items.iter().for_each(|item| {
        s += &format!("{}: {} {}\n", item.name, item.amount, item.measurement_unit);
    });

    s += "\n";
    s += SHOPPING_LIST_FOOTER;
    s
}

pub fn file_name(username: &str) -> String {
    format!("{username}{SHOPPING_LIST_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;

    fn part(name: &str, unit: &str, amount: i32) -> CartPart {
        CartPart {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn amounts_are_summed_per_ingredient() {
        let items = aggregate(vec![part("Salt", "g", 5), part("Salt", "g", 3)]);

        assert_eq!(
            items,
            vec![ShoppingListItem {
                name: String::from("Salt"),
                measurement_unit: String::from("g"),
                amount: 8,
            }]
        );
    }

    #[test]
    fn units_are_kept_apart_and_order_is_alphabetical() {
        let items = aggregate(vec![
            part("Sugar", "g", 100),
            part("Milk", "ml", 200),
            part("Milk", "cup", 1),
            part("Sugar", "g", 50),
            part("Eggs", "pcs", 2),
        ]);

        let lines: Vec<(&str, &str, i64)> = items
            .iter()
            .map(|i| (i.name.as_str(), i.measurement_unit.as_str(), i.amount))
            .collect();
        assert_eq!(
            lines,
            vec![
                ("Eggs", "pcs", 2),
                ("Milk", "cup", 1),
                ("Milk", "ml", 200),
                ("Sugar", "g", 150),
            ]
        );
    }

    #[test]
    fn totals_do_not_overflow_i32() {
        let items = aggregate(vec![part("Flour", "g", i32::MAX), part("Flour", "g", i32::MAX)]);

        assert_eq!(items[0].amount, 2 * i64::from(i32::MAX));
    }

    #[test]
    fn totals_match_sum_of_parts() {
        let parts: Vec<CartPart> = (1..=20)
            .map(|i| part(if i % 3 == 0 { "Rice" } else { "Beans" }, "g", i))
            .collect();
        let expected_rice: i64 = parts
            .iter()
            .filter(|p| p.name == "Rice")
            .map(|p| i64::from(p.amount))
            .sum();

        let items = aggregate(parts);
        let rice = items.iter().find(|i| i.name == "Rice").unwrap();

        assert_eq!(rice.amount, expected_rice);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn empty_cart_renders_header_and_footer() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 18, 5, 0).unwrap();

        assert_eq!(
            render("Anna", &at, &[]),
            "Shopping list (Anna)\n09/03/2024 18:05\n\n\nFoodgram"
        );
    }

    #[test]
    fn report_lines() {
        let at = FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 12, 31, 23, 59, 0)
            .unwrap();
        let items = aggregate(vec![part("Salt", "g", 5), part("Salt", "g", 3), part("Apple", "pcs", 2)]);

        let report = render("Anna", &at, &items);

        assert_eq!(
            report,
            "Shopping list (Anna)\n31/12/2024 23:59\n\nApple: 2 pcs\nSalt: 8 g\n\nFoodgram"
        );
        assert_eq!(report.lines().filter(|l| l.starts_with("Salt")).count(), 1);
    }

    #[test]
    fn attachment_name() {
        assert_eq!(file_name("anna"), "anna_shopping_list.txt");
    }
}

use crate::models::{BusinessRow, WaitlistRow};
use crate::{Database, OptionalExt};
use anyhow::Result;
use rusqlite::{params, types::Value, params_from_iter};

impl Database {
    // -- Businesses --

    /// New listings always start as `pending`; the `pending -> approved`
    /// transition is an out-of-band admin action.
    #[allow(clippy::too_many_arguments)]
    pub fn create_business(
        &self,
        id: &str,
        user_id: &str,
        name: &str,
        category: &str,
        description: &str,
        contact: &str,
        products: &str,
        logo: Option<&str>,
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO businesses (id, user_id, name, category, description,
                                         contact, products, logo, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9)",
                params![id, user_id, name, category, description, contact, products, logo, now],
            )?;
            Ok(())
        })
    }

    pub fn get_business(&self, id: &str) -> Result<Option<BusinessRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM businesses WHERE id = ?1",
                BUSINESS_COLUMNS
            ))?;
            let row = stmt.query_row([id], map_business).optional()?;
            Ok(row)
        })
    }

    /// Public directory: approved listings only, newest first. `category`
    /// is a substring filter; `search` matches name or description.
    pub fn list_approved_businesses(
        &self,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<BusinessRow>> {
        self.with_conn(|conn| {
            let mut filter = String::from("status = 'approved'");
            let mut values: Vec<Value> = Vec::new();

            if let Some(category) = category.filter(|c| !c.is_empty()) {
                filter.push_str(&format!(" AND category LIKE ?{}", values.len() + 1));
                values.push(Value::from(format!("%{}%", category)));
            }
            if let Some(term) = search.filter(|t| !t.is_empty()) {
                let pattern = format!("%{}%", term);
                filter.push_str(&format!(
                    " AND (name LIKE ?{n} OR description LIKE ?{n})",
                    n = values.len() + 1
                ));
                values.push(Value::from(pattern));
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM businesses WHERE {} ORDER BY created_at DESC",
                BUSINESS_COLUMNS, filter
            ))?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), map_business)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Waitlist --

    pub fn find_waitlist_entry(&self, email: &str) -> Result<Option<WaitlistRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, business_name, category, status, created_at
                 FROM waitlist WHERE email = ?1",
            )?;
            let row = stmt.query_row([email], map_waitlist).optional()?;
            Ok(row)
        })
    }

    pub fn insert_waitlist_entry(
        &self,
        id: &str,
        email: &str,
        business_name: Option<&str>,
        category: Option<&str>,
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO waitlist (id, email, business_name, category, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                params![id, email, business_name, category, now],
            )?;
            Ok(())
        })
    }
}

const BUSINESS_COLUMNS: &str =
    "id, user_id, name, category, description, contact, products, logo, status, created_at";

fn map_business(row: &rusqlite::Row<'_>) -> rusqlite::Result<BusinessRow> {
    Ok(BusinessRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        contact: row.get(5)?,
        products: row.get(6)?,
        logo: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_waitlist(row: &rusqlite::Row<'_>) -> rusqlite::Result<WaitlistRow> {
    Ok(WaitlistRow {
        id: row.get(0)?,
        email: row.get(1)?,
        business_name: row.get(2)?,
        category: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
    })
}

//! SQLite persistence for towns, regions, cash points and banks.
//!
//! Each pipeline stage writes its own database file. Raw stages insert
//! strictly (a duplicate id is an error); the enrichment stage inserts with
//! `OR IGNORE` so re-running it over the same rows is harmless.

use std::path::Path;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Row};

use crate::error::Result;
use crate::types::{Bank, BankBranch, CashPoint, EnrichedCashPoint, PointType, Region, Town};

const CREATE_TOWNS: &str = "CREATE TABLE IF NOT EXISTS towns (
    id INTEGER PRIMARY KEY,
    name TEXT,
    name_tr TEXT,
    region_id INTEGER,
    regional_center INTEGER,
    latitude REAL,
    longitude REAL,
    zoom INTEGER,
    has_emblem INTEGER
)";

const CREATE_REGIONS: &str = "CREATE TABLE IF NOT EXISTS regions (
    id INTEGER PRIMARY KEY,
    name TEXT,
    name_tr TEXT,
    latitude REAL,
    longitude REAL,
    zoom INTEGER
)";

/// Columns shared by the raw and enriched cash point tables.
const CASHPOINT_COLUMNS: &str = "id INTEGER PRIMARY KEY,
    type TEXT,
    bank_id INTEGER,
    town_id INTEGER,
    longitude REAL,
    latitude REAL,
    address TEXT,
    address_comment TEXT,
    metro_name TEXT,
    free_access INTEGER,
    main_office INTEGER,
    without_weekend INTEGER,
    round_the_clock INTEGER,
    works_as_shop INTEGER,
    schedule_general TEXT,
    schedule_private TEXT,
    schedule_vip TEXT,
    tel TEXT,
    additional TEXT";

const SELECT_CASHPOINT: &str = "SELECT id, type, bank_id, town_id, longitude, latitude, address,
    address_comment, metro_name, free_access, main_office, without_weekend, round_the_clock,
    works_as_shop, schedule_general, schedule_private, schedule_vip, tel, additional
    FROM cashpoints";

const CREATE_BANKS: &str = "CREATE TABLE IF NOT EXISTS banks (
    id INTEGER PRIMARY KEY,
    name TEXT,
    licence INTEGER UNIQUE,
    name_tr TEXT,
    region TEXT
)";

const CREATE_BANKS_MAPPING: &str = "CREATE TABLE IF NOT EXISTS banks_mapping (
    id INTEGER PRIMARY KEY,
    parent INTEGER
)";

impl ToSql for PointType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PointType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        PointType::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("unknown point type '{text}'").into()))
    }
}

fn cash_point_from_row(row: &Row<'_>) -> rusqlite::Result<CashPoint> {
    Ok(CashPoint {
        id: row.get(0)?,
        point_type: row.get(1)?,
        bank_id: row.get(2)?,
        town_id: row.get(3)?,
        longitude: row.get(4)?,
        latitude: row.get(5)?,
        address: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        address_comment: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        metro_name: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        free_access: row.get(9)?,
        main_office: row.get(10)?,
        without_weekend: row.get(11)?,
        round_the_clock: row.get(12)?,
        works_as_shop: row.get(13)?,
        schedule_general: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
        schedule_private: row.get::<_, Option<String>>(15)?.unwrap_or_default(),
        schedule_vip: row.get::<_, Option<String>>(16)?.unwrap_or_default(),
        tel: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
        additional: row.get::<_, Option<String>>(18)?.unwrap_or_default(),
    })
}

/// One SQLite database file.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn create_town_tables(&self) -> Result<()> {
        self.conn.execute(CREATE_TOWNS, [])?;
        self.conn.execute(CREATE_REGIONS, [])?;
        Ok(())
    }

    /// Raw cash point table (19 columns).
    pub fn create_cashpoint_table(&self) -> Result<()> {
        self.conn.execute(
            &format!("CREATE TABLE IF NOT EXISTS cashpoints ({CASHPOINT_COLUMNS})"),
            [],
        )?;
        Ok(())
    }

    /// Enriched cash point table: the raw columns plus currency and cash-in flags.
    pub fn create_enriched_cashpoint_table(&self) -> Result<()> {
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS cashpoints ({CASHPOINT_COLUMNS},
    rub INTEGER,
    usd INTEGER,
    eur INTEGER,
    cash_in INTEGER)"
            ),
            [],
        )?;
        Ok(())
    }

    pub fn create_bank_tables(&self) -> Result<()> {
        self.conn.execute(CREATE_BANKS, [])?;
        self.conn.execute(CREATE_BANKS_MAPPING, [])?;
        Ok(())
    }

    /// Insert all towns in one transaction.
    pub fn insert_towns(&mut self, towns: &[Town]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO towns VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)")?;
            for town in towns {
                stmt.execute(params![
                    town.id,
                    town.name,
                    town.name_tr,
                    town.region_id,
                    town.regional_center,
                    town.latitude,
                    town.longitude,
                    town.zoom,
                    town.has_emblem,
                ])?;
            }
        }
        tx.commit()?;
        Ok(towns.len())
    }

    pub fn insert_regions<'a>(
        &mut self,
        regions: impl IntoIterator<Item = &'a Region>,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare("INSERT INTO regions VALUES (?1, ?2, ?3, ?4, ?5, ?6)")?;
            for region in regions {
                stmt.execute(params![
                    region.id,
                    region.name,
                    region.name_tr,
                    region.latitude,
                    region.longitude,
                    region.zoom,
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Town ids in ascending order.
    pub fn town_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM towns ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    pub fn load_towns(&self) -> Result<Vec<Town>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, name_tr, region_id, regional_center, latitude, longitude, zoom,
                    has_emblem
             FROM towns ORDER BY id",
        )?;
        let towns = stmt
            .query_map([], |row| {
                Ok(Town {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    name_tr: row.get(2)?,
                    region_id: row.get(3)?,
                    regional_center: row.get(4)?,
                    latitude: row.get(5)?,
                    longitude: row.get(6)?,
                    zoom: row.get(7)?,
                    has_emblem: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(towns)
    }

    pub fn load_regions(&self) -> Result<Vec<Region>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, name_tr, latitude, longitude, zoom FROM regions ORDER BY id",
        )?;
        let regions = stmt
            .query_map([], |row| {
                Ok(Region {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    name_tr: row.get(2)?,
                    latitude: row.get(3)?,
                    longitude: row.get(4)?,
                    zoom: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(regions)
    }

    /// Strictly insert one scope's points and commit.
    ///
    /// Nothing from the scope is kept if any insert fails.
    pub fn commit_scope(&mut self, points: &[CashPoint]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO cashpoints VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                  ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            )?;
            for p in points {
                stmt.execute(params![
                    p.id,
                    p.point_type,
                    p.bank_id,
                    p.town_id,
                    p.longitude,
                    p.latitude,
                    p.address,
                    p.address_comment,
                    p.metro_name,
                    p.free_access,
                    p.main_office,
                    p.without_weekend,
                    p.round_the_clock,
                    p.works_as_shop,
                    p.schedule_general,
                    p.schedule_private,
                    p.schedule_vip,
                    p.tel,
                    p.additional,
                ])?;
            }
        }
        tx.commit()?;
        Ok(points.len())
    }

    /// All raw cash points, by id.
    pub fn load_cash_points(&self) -> Result<Vec<CashPoint>> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_CASHPOINT} ORDER BY id"))?;
        let points = stmt
            .query_map([], cash_point_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }

    /// Insert enriched points, ignoring ids already present. Returns rows written.
    pub fn insert_enriched(&mut self, points: &[EnrichedCashPoint]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO cashpoints VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                  ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19,
                  ?20, ?21, ?22, ?23)",
            )?;
            for e in points {
                let p = &e.point;
                written += stmt.execute(params![
                    p.id,
                    p.point_type,
                    p.bank_id,
                    p.town_id,
                    p.longitude,
                    p.latitude,
                    p.address,
                    p.address_comment,
                    p.metro_name,
                    p.free_access,
                    p.main_office,
                    p.without_weekend,
                    p.round_the_clock,
                    p.works_as_shop,
                    p.schedule_general,
                    p.schedule_private,
                    p.schedule_vip,
                    p.tel,
                    p.additional,
                    e.rub,
                    e.usd,
                    e.eur,
                    e.cash_in,
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn load_enriched(&self) -> Result<Vec<EnrichedCashPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, type, bank_id, town_id, longitude, latitude, address,
                address_comment, metro_name, free_access, main_office, without_weekend,
                round_the_clock, works_as_shop, schedule_general, schedule_private, schedule_vip,
                tel, additional, rub, usd, eur, cash_in
             FROM cashpoints ORDER BY id",
        )?;
        let points = stmt
            .query_map([], |row| {
                Ok(EnrichedCashPoint {
                    point: cash_point_from_row(row)?,
                    rub: row.get(19)?,
                    usd: row.get(20)?,
                    eur: row.get(21)?,
                    cash_in: row.get(22)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }

    pub fn insert_banks(&mut self, banks: &[Bank], branches: &[BankBranch]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO banks VALUES (?1, ?2, ?3, ?4, ?5)")?;
            for bank in banks {
                stmt.execute(params![
                    bank.id,
                    bank.name,
                    bank.licence,
                    bank.name_tr,
                    bank.region,
                ])?;
            }
            let mut stmt = tx.prepare("INSERT INTO banks_mapping VALUES (?1, ?2)")?;
            for branch in branches {
                stmt.execute(params![branch.id, branch.parent])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_bank_branches(&self) -> Result<Vec<BankBranch>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, parent FROM banks_mapping ORDER BY id")?;
        let branches = stmt
            .query_map([], |row| {
                Ok(BankBranch {
                    id: row.get(0)?,
                    parent: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(branches)
    }

    /// Row count of `table`. The name must be one of this module's tables.
    pub fn count(&self, table: &str) -> Result<i64> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }
}

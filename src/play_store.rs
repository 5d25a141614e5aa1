use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, Row, params};

use crate::data_access::{PlaySource, gate_season};
use crate::error::EngineResult;
use crate::play::{GameType, Play, PlayType, SeasonType};

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS plays (
            game_id TEXT NOT NULL,
            play_id INTEGER NOT NULL,
            season INTEGER NOT NULL,
            season_type TEXT NOT NULL,
            week INTEGER NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            offense TEXT NOT NULL,
            defense TEXT NOT NULL,
            drive INTEGER NULL,
            drive_time_secs INTEGER NULL,
            down INTEGER NULL,
            yards_to_go INTEGER NULL,
            yardline_100 INTEGER NULL,
            play_type TEXT NOT NULL,
            yards_gained INTEGER NOT NULL,
            first_down INTEGER NULL,
            touchdown INTEGER NOT NULL,
            interception INTEGER NOT NULL,
            fumble_lost INTEGER NOT NULL,
            no_play INTEGER NOT NULL,
            scramble INTEGER NOT NULL,
            epa REAL NULL,
            success INTEGER NULL,
            passer TEXT NULL,
            rusher TEXT NULL,
            air_yards INTEGER NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (game_id, play_id)
        );
        CREATE INDEX IF NOT EXISTS idx_plays_season ON plays(season);
        CREATE INDEX IF NOT EXISTS idx_plays_offense ON plays(season, offense);
        CREATE INDEX IF NOT EXISTS idx_plays_defense ON plays(season, defense);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Insert or replace plays in one transaction. Returns the number written.
pub fn upsert_plays(conn: &mut Connection, plays: &[Play]) -> Result<usize> {
    let tx = conn.transaction().context("begin play upsert")?;
    let now = Utc::now().to_rfc3339();
    for p in plays {
        upsert_play(&tx, p, &now)?;
    }
    tx.commit().context("commit play upsert")?;
    Ok(plays.len())
}

fn upsert_play(tx: &rusqlite::Transaction<'_>, p: &Play, now: &str) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO plays (
            game_id, play_id, season, season_type, week,
            home_team, away_team, offense, defense,
            drive, drive_time_secs, down, yards_to_go, yardline_100,
            play_type, yards_gained, first_down, touchdown, interception,
            fumble_lost, no_play, scramble, epa, success,
            passer, rusher, air_yards, home_score, away_score, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18, ?19,
            ?20, ?21, ?22, ?23, ?24,
            ?25, ?26, ?27, ?28, ?29, ?30
        )
        ON CONFLICT(game_id, play_id) DO UPDATE SET
            season = excluded.season,
            season_type = excluded.season_type,
            week = excluded.week,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            offense = excluded.offense,
            defense = excluded.defense,
            drive = excluded.drive,
            drive_time_secs = excluded.drive_time_secs,
            down = excluded.down,
            yards_to_go = excluded.yards_to_go,
            yardline_100 = excluded.yardline_100,
            play_type = excluded.play_type,
            yards_gained = excluded.yards_gained,
            first_down = excluded.first_down,
            touchdown = excluded.touchdown,
            interception = excluded.interception,
            fumble_lost = excluded.fumble_lost,
            no_play = excluded.no_play,
            scramble = excluded.scramble,
            epa = excluded.epa,
            success = excluded.success,
            passer = excluded.passer,
            rusher = excluded.rusher,
            air_yards = excluded.air_yards,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            updated_at = excluded.updated_at
        "#,
        params![
            p.game_id,
            p.play_id,
            p.season,
            p.season_type.as_str(),
            p.week,
            p.home_team,
            p.away_team,
            p.offense,
            p.defense,
            p.drive,
            p.drive_time_secs,
            p.down,
            p.yards_to_go,
            p.yardline_100,
            p.play_type.as_str(),
            p.yards_gained,
            p.first_down,
            p.touchdown,
            p.interception,
            p.fumble_lost,
            p.no_play,
            p.scramble,
            p.epa,
            p.success,
            p.passer,
            p.rusher,
            p.air_yards,
            p.home_score,
            p.away_score,
            now,
        ],
    )
    .with_context(|| format!("upsert play {} #{}", p.game_id, p.play_id))?;
    Ok(())
}

pub fn load_season_plays(conn: &Connection, season: u16) -> rusqlite::Result<Vec<Play>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT
            game_id, play_id, season, season_type, week,
            home_team, away_team, offense, defense,
            drive, drive_time_secs, down, yards_to_go, yardline_100,
            play_type, yards_gained, first_down, touchdown, interception,
            fumble_lost, no_play, scramble, epa, success,
            passer, rusher, air_yards, home_score, away_score
        FROM plays
        WHERE season = ?1
        ORDER BY game_id ASC, play_id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![season], decode_play)?;
    rows.collect()
}

pub fn stored_seasons(conn: &Connection) -> rusqlite::Result<Vec<u16>> {
    let mut stmt = conn.prepare("SELECT DISTINCT season FROM plays ORDER BY season ASC")?;
    let rows = stmt.query_map([], |row| row.get::<_, u16>(0))?;
    rows.collect()
}

fn decode_play(row: &Row<'_>) -> rusqlite::Result<Play> {
    let season_type_raw: String = row.get(3)?;
    let season_type = SeasonType::parse(&season_type_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown season type {season_type_raw}").into(),
        )
    })?;
    let play_type_raw: String = row.get(14)?;
    Ok(Play {
        game_id: row.get(0)?,
        play_id: row.get(1)?,
        season: row.get(2)?,
        season_type,
        week: row.get(4)?,
        home_team: row.get(5)?,
        away_team: row.get(6)?,
        offense: row.get(7)?,
        defense: row.get(8)?,
        drive: row.get(9)?,
        drive_time_secs: row.get(10)?,
        down: row.get(11)?,
        yards_to_go: row.get(12)?,
        yardline_100: row.get(13)?,
        play_type: PlayType::parse(&play_type_raw),
        yards_gained: row.get(15)?,
        first_down: row.get(16)?,
        touchdown: row.get(17)?,
        interception: row.get(18)?,
        fumble_lost: row.get(19)?,
        no_play: row.get(20)?,
        scramble: row.get(21)?,
        epa: row.get(22)?,
        success: row.get(23)?,
        passer: row.get(24)?,
        rusher: row.get(25)?,
        air_yards: row.get(26)?,
        home_score: row.get(27)?,
        away_score: row.get(28)?,
    })
}

/// Plays kept in a SQLite file on disk.
pub struct SqlitePlayStore {
    conn: Connection,
}

impl SqlitePlayStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn upsert(&mut self, plays: &[Play]) -> Result<usize> {
        upsert_plays(&mut self.conn, plays)
    }
}

impl PlaySource for SqlitePlayStore {
    fn league_plays(&self, season: u16, game_type: GameType) -> EngineResult<Vec<Play>> {
        gate_season(season, self.raw_season(season)?, game_type)
    }

    fn seasons(&self) -> EngineResult<Vec<u16>> {
        Ok(stored_seasons(&self.conn)?)
    }

    fn raw_season(&self, season: u16) -> EngineResult<Vec<Play>> {
        Ok(load_season_plays(&self.conn, season)?)
    }
}

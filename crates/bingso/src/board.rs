//! Public status board (전광판).
//!
//! A background poller keeps one [`Board`] per funeral home: it reloads the
//! active funerals and their condolence messages on the refresh interval
//! and advances the carousel on the rotation interval. Both timers run
//! independently with no coalescing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format::{religion_symbol, schedule_label, sorted_family};
use crate::model::{CondolenceMessage, FamilyMember, FuneralRecord};
use crate::rooms::RoomNumber;
use crate::storage::FuneralBackend;

/// Shown when no funeral is in progress.
pub const EMPTY_MESSAGE: &str = "현재 진행 중인 장례가 없습니다";

/// One funeral as shown on the board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slide {
    /// Funeral id.
    pub funeral_id: Option<String>,
    /// Room number.
    pub room_number: RoomNumber,
    /// Room display name.
    pub room_name: String,
    /// Floor label.
    pub floor: String,
    /// Deceased name.
    pub deceased_name: String,
    /// Deceased name in hanja.
    pub deceased_hanja: String,
    /// Age in years.
    pub age: Option<u32>,
    /// Gender label.
    pub gender: String,
    /// Religion.
    pub religion: String,
    /// Symbol for the religion, empty when none.
    pub religion_symbol: String,
    /// Religious title.
    pub religion_title: String,
    /// Photo, if any.
    pub photo_url: Option<String>,
    /// Family members in precedence order.
    pub family_members: Vec<FamilyMember>,
    /// Casketing label.
    pub casket_label: String,
    /// Procession label.
    pub funeral_label: String,
    /// Burial method label, empty when unset.
    pub burial_type: String,
    /// Burial location.
    pub burial_location: String,
    /// Newest condolence message of the room.
    pub latest_message: Option<CondolenceMessage>,
}

impl Slide {
    /// Build a slide from a record and its room's newest message.
    #[must_use]
    pub fn new(record: &FuneralRecord, latest_message: Option<CondolenceMessage>) -> Self {
        let info = record.room_number.info();
        Self {
            funeral_id: record.id.clone(),
            room_number: record.room_number,
            room_name: info.name.to_string(),
            floor: info.floor.to_string(),
            deceased_name: record.deceased_name.clone(),
            deceased_hanja: record.deceased_hanja.clone(),
            age: record.age,
            gender: record.gender.clone(),
            religion: record.religion.clone(),
            religion_symbol: religion_symbol(&record.religion).to_string(),
            religion_title: record.religion_title.clone(),
            photo_url: record.photo_url.clone(),
            family_members: sorted_family(&record.family_members),
            casket_label: schedule_label(record.casket_time.as_ref()),
            funeral_label: schedule_label(record.funeral_time.as_ref()),
            burial_type: record
                .burial_type
                .map(|b| b.label().to_string())
                .unwrap_or_default(),
            burial_location: record.burial_location.clone(),
            latest_message,
        }
    }
}

/// Load the slides of a home, optionally pinned to one room.
///
/// Records without a deceased name are skipped. A room whose messages fail
/// to load is shown without a message.
///
/// # Errors
///
/// Returns a backend error when the funeral list cannot be loaded.
pub fn load_slides<B: FuneralBackend>(
    backend: &B,
    home: &str,
    pinned: Option<RoomNumber>,
) -> Result<Vec<Slide>> {
    let funerals = backend.active_funerals(home)?;
    let slides = funerals
        .iter()
        .filter(|f| !f.deceased_name.trim().is_empty())
        .filter(|f| pinned.map_or(true, |room| f.room_number == room))
        .map(|f| {
            let latest = match backend.condolences(home, f.room_number) {
                Ok(messages) => messages.into_iter().next(),
                Err(e) => {
                    warn!(room = %f.room_number, error = %e, "Could not load condolences for the board");
                    None
                }
            };
            Slide::new(f, latest)
        })
        .collect();
    Ok(slides)
}

/// Slide position and rotation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Carousel {
    index: usize,
    len: usize,
    auto_rotate: bool,
}

impl Default for Carousel {
    fn default() -> Self {
        Self {
            index: 0,
            len: 0,
            auto_rotate: true,
        }
    }
}

impl Carousel {
    /// Current slide index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of slides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no slides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the carousel advances on its own.
    #[must_use]
    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    /// Update the slide count, keeping the index in range.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        if self.index >= len {
            self.index = 0;
        }
    }

    /// Rotation tick: move to the next slide when auto rotation is on.
    pub fn tick(&mut self) {
        if self.auto_rotate {
            self.advance();
        }
    }

    /// Move to the next slide, wrapping around.
    pub fn advance(&mut self) {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
    }

    /// Move to the previous slide, wrapping around.
    pub fn go_back(&mut self) {
        if self.len > 0 {
            self.index = (self.index + self.len - 1) % self.len;
        }
    }

    /// Jump to a slide and stop auto rotation.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `index` is out of range.
    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(Error::validation(format!(
                "slide {index} does not exist ({} slides)",
                self.len
            )));
        }
        self.index = index;
        self.auto_rotate = false;
        Ok(())
    }

    /// Flip auto rotation.
    pub fn toggle(&mut self) {
        self.auto_rotate = !self.auto_rotate;
    }
}

/// A manual control of the carousel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RotationCommand {
    /// Next slide.
    Next,
    /// Previous slide.
    Previous,
    /// Jump to a slide; turns auto rotation off.
    Select {
        /// Slide index.
        index: usize,
    },
    /// Flip auto rotation.
    Toggle,
}

/// The board of one home.
#[derive(Debug, Clone, Default)]
pub struct Board {
    slides: Vec<Slide>,
    carousel: Carousel,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Board {
    /// Replace the slides after a refresh.
    pub fn refresh(&mut self, slides: Vec<Slide>) {
        self.carousel.set_len(slides.len());
        self.slides = slides;
        self.refreshed_at = Some(Utc::now());
    }

    /// Apply a manual control.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an out-of-range selection.
    pub fn control(&mut self, command: RotationCommand) -> Result<()> {
        match command {
            RotationCommand::Next => self.carousel.advance(),
            RotationCommand::Previous => self.carousel.go_back(),
            RotationCommand::Select { index } => self.carousel.select(index)?,
            RotationCommand::Toggle => self.carousel.toggle(),
        }
        Ok(())
    }

    /// Rotation tick.
    pub fn tick(&mut self) {
        self.carousel.tick();
    }

    /// The carousel state.
    #[must_use]
    pub fn carousel(&self) -> Carousel {
        self.carousel
    }

    /// Snapshot for display.
    #[must_use]
    pub fn view(&self, facility_name: &str) -> BoardView {
        BoardView {
            facility_name: facility_name.to_string(),
            current: self.slides.get(self.carousel.index()).cloned(),
            index: self.carousel.index(),
            total: self.slides.len(),
            auto_rotate: self.carousel.auto_rotate(),
            pinned: false,
            message: self.slides.is_empty().then(|| EMPTY_MESSAGE.to_string()),
            refreshed_at: self.refreshed_at,
        }
    }
}

/// What the board shows right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardView {
    /// Facility name for the header.
    pub facility_name: String,
    /// The slide on screen.
    pub current: Option<Slide>,
    /// Its index.
    pub index: usize,
    /// Number of slides.
    pub total: usize,
    /// Whether the board rotates on its own.
    pub auto_rotate: bool,
    /// Whether the view is pinned to one room.
    pub pinned: bool,
    /// Placeholder text when nothing is in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the data was last loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl BoardView {
    /// A view pinned to one room, loaded on demand.
    #[must_use]
    pub fn pinned(facility_name: &str, slides: Vec<Slide>) -> Self {
        let total = slides.len();
        Self {
            facility_name: facility_name.to_string(),
            current: slides.into_iter().next(),
            index: 0,
            total,
            auto_rotate: false,
            pinned: true,
            message: (total == 0).then(|| EMPTY_MESSAGE.to_string()),
            refreshed_at: Some(Utc::now()),
        }
    }
}

/// Boards of every home, shared between the poller and request handlers.
#[derive(Debug, Clone, Default)]
pub struct BoardHub {
    boards: Arc<RwLock<HashMap<String, Board>>>,
}

impl BoardHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the board of `home`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned, or what `f` returns.
    pub fn with_board<T>(&self, home: &str, f: impl FnOnce(&mut Board) -> Result<T>) -> Result<T> {
        let mut boards = self
            .boards
            .write()
            .map_err(|_| Error::internal("board lock poisoned"))?;
        f(boards.entry(home.to_string()).or_default())
    }

    /// Reload the slides of `home`.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the funeral list cannot be loaded.
    pub fn refresh<B: FuneralBackend>(&self, backend: &B, home: &str) -> Result<()> {
        let slides = load_slides(backend, home, None)?;
        debug!(home, slides = slides.len(), "Refreshed status board");
        self.with_board(home, |board| {
            board.refresh(slides);
            Ok(())
        })
    }

    /// Advance every board that rotates on its own.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn tick_all(&self) -> Result<()> {
        let mut boards = self
            .boards
            .write()
            .map_err(|_| Error::internal("board lock poisoned"))?;
        for board in boards.values_mut() {
            board.tick();
        }
        Ok(())
    }

    /// Current view of `home`.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn view(&self, home: &str, facility_name: &str) -> Result<BoardView> {
        self.with_board(home, |board| Ok(board.view(facility_name)))
    }
}

/// Reload every board of `homes` on the blocking pool.
async fn refresh_homes<B>(backend: &B, hub: &BoardHub, homes: &Arc<[String]>)
where
    B: FuneralBackend + Clone + Send + 'static,
{
    let (backend, hub, homes) = (backend.clone(), hub.clone(), Arc::clone(homes));
    let task = tokio::task::spawn_blocking(move || {
        for home in homes.iter() {
            if let Err(e) = hub.refresh(&backend, home) {
                warn!(home = %home, error = %e, "Status board refresh failed");
            }
        }
    });
    if let Err(e) = task.await {
        warn!(error = %e, "Status board refresh task failed");
    }
}

/// Start the refresh and rotation timers for `homes`.
///
/// Both timers fire immediately, then every `refresh` and `rotate`.
/// Storage reads run on the blocking pool.
pub fn spawn_poller<B>(
    backend: B,
    hub: BoardHub,
    homes: Vec<String>,
    refresh: Duration,
    rotate: Duration,
) -> JoinHandle<()>
where
    B: FuneralBackend + Clone + Send + Sync + 'static,
{
    let homes: Arc<[String]> = homes.into();
    tokio::spawn(async move {
        let mut refresh_timer = interval(refresh);
        let mut rotate_timer = interval(rotate);
        refresh_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        rotate_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first rotation tick fires at once; skip it so slide 0 stays up.
        rotate_timer.tick().await;

        loop {
            tokio::select! {
                _ = refresh_timer.tick() => refresh_homes(&backend, &hub, &homes).await,
                _ = rotate_timer.tick() => {
                    if let Err(e) = hub.tick_all() {
                        warn!(error = %e, "Status board rotation failed");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{wall_clock, BurialType, NewCondolence};
    use crate::storage::{SharedStorage, Storage};

    fn room(n: u8) -> RoomNumber {
        RoomNumber::new(n).unwrap()
    }

    fn seed(storage: &impl FuneralBackend, n: u8, name: &str) {
        let mut record = FuneralRecord::new("home-1", room(n), name);
        record.religion = "불교".to_string();
        record.burial_type = Some(BurialType::Burial);
        record.funeral_time = wall_clock::parse("2025-01-18T07:00");
        record.family_members = vec![
            FamilyMember::new("딸", "영희", ""),
            FamilyMember::new("상주", "철수", ""),
        ];
        storage.insert_funeral(&record).unwrap();
    }

    fn message(storage: &impl FuneralBackend, n: u8, sender: &str, minutes_ago: i64) {
        storage
            .insert_condolence(&NewCondolence {
                funeral_home_id: "home-1".to_string(),
                room_number: room(n),
                sender_name: sender.to_string(),
                sender_relation: String::new(),
                message: "명복을 빕니다".to_string(),
                created_at: Some(Utc::now() - chrono::Duration::minutes(minutes_ago)),
            })
            .unwrap();
    }

    #[test]
    fn test_carousel_wraps_and_clamps() {
        let mut c = Carousel::default();
        c.tick();
        assert_eq!(c.index(), 0);

        c.set_len(3);
        c.tick();
        c.tick();
        assert_eq!(c.index(), 2);
        c.tick();
        assert_eq!(c.index(), 0);
        c.go_back();
        assert_eq!(c.index(), 2);

        c.set_len(2);
        assert_eq!(c.index(), 0);
        c.set_len(0);
        assert!(c.is_empty());
    }

    #[test]
    fn test_carousel_select_stops_rotation() {
        let mut c = Carousel::default();
        c.set_len(3);
        c.select(2).unwrap();
        assert_eq!(c.index(), 2);
        assert!(!c.auto_rotate());
        c.tick();
        assert_eq!(c.index(), 2);

        assert!(c.select(3).is_err());

        c.toggle();
        assert!(c.auto_rotate());
        c.tick();
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn test_rotation_command_deserialize() {
        let cmd: RotationCommand = serde_json::from_str(r#"{"action":"select","index":1}"#).unwrap();
        assert_eq!(cmd, RotationCommand::Select { index: 1 });
        let cmd: RotationCommand = serde_json::from_str(r#"{"action":"toggle"}"#).unwrap();
        assert_eq!(cmd, RotationCommand::Toggle);
    }

    #[test]
    fn test_slide_content() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage, 5, "홍길동");
        message(&storage, 5, "오래된", 10);
        message(&storage, 5, "최근", 1);

        let slides = load_slides(&storage, "home-1", None).unwrap();
        assert_eq!(slides.len(), 1);
        let slide = &slides[0];
        assert_eq!(slide.room_name, "특실 5빈소");
        assert_eq!(slide.floor, "5층");
        assert_eq!(slide.religion_symbol, "卍");
        assert_eq!(slide.burial_type, "매장");
        assert_eq!(slide.funeral_label, "1월 18일 (토) 오전 7:00");
        assert_eq!(slide.casket_label, "시간미정");
        assert_eq!(slide.family_members[0].relation, "상주");
        assert_eq!(slide.latest_message.as_ref().unwrap().sender_name, "최근");
    }

    #[test]
    fn test_load_slides_pinned_and_skips_unnamed() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage, 1, "홍길동");
        seed(&storage, 3, "김영희");
        seed(&storage, 4, " ");

        assert_eq!(load_slides(&storage, "home-1", None).unwrap().len(), 2);
        let pinned = load_slides(&storage, "home-1", Some(room(3))).unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].deceased_name, "김영희");
    }

    #[test]
    fn test_hub_refresh_and_view() {
        let storage = Storage::open_in_memory().unwrap();
        let hub = BoardHub::new();

        hub.refresh(&storage, "home-1").unwrap();
        let empty = hub.view("home-1", "영동병원장례식장").unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.message.as_deref(), Some(EMPTY_MESSAGE));

        seed(&storage, 1, "홍길동");
        seed(&storage, 2, "김영희");
        hub.refresh(&storage, "home-1").unwrap();
        hub.tick_all().unwrap();

        let view = hub.view("home-1", "영동병원장례식장").unwrap();
        assert_eq!(view.total, 2);
        assert_eq!(view.index, 1);
        assert_eq!(view.current.unwrap().deceased_name, "김영희");
        assert!(view.message.is_none());
    }

    #[test]
    fn test_board_control() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage, 1, "홍길동");
        seed(&storage, 2, "김영희");
        let hub = BoardHub::new();
        hub.refresh(&storage, "home-1").unwrap();

        hub.with_board("home-1", |b| b.control(RotationCommand::Select { index: 1 }))
            .unwrap();
        hub.tick_all().unwrap();
        let view = hub.view("home-1", "x").unwrap();
        assert_eq!(view.index, 1);
        assert!(!view.auto_rotate);

        assert!(hub
            .with_board("home-1", |b| b.control(RotationCommand::Select { index: 9 }))
            .is_err());
    }

    #[test]
    fn test_pinned_view() {
        let view = BoardView::pinned("x", Vec::new());
        assert!(view.pinned);
        assert!(!view.auto_rotate);
        assert_eq!(view.message.as_deref(), Some(EMPTY_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_refreshes_and_rotates() {
        let shared = SharedStorage::new(Storage::open_in_memory().unwrap());
        seed(&shared, 1, "홍길동");
        seed(&shared, 2, "김영희");
        let hub = BoardHub::new();

        let handle = spawn_poller(
            shared.clone(),
            hub.clone(),
            vec!["home-1".to_string()],
            Duration::from_secs(10),
            Duration::from_secs(15),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        let view = hub.view("home-1", "x").unwrap();
        assert_eq!(view.total, 2);
        assert_eq!(view.index, 0);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(hub.view("home-1", "x").unwrap().index, 1);

        handle.abort();
    }

    /// Shared storage that records which threads read the funeral list.
    #[derive(Debug, Clone)]
    struct ThreadRecordingBackend {
        inner: SharedStorage,
        readers: Arc<std::sync::Mutex<Vec<std::thread::ThreadId>>>,
    }

    impl FuneralBackend for ThreadRecordingBackend {
        fn active_funerals(&self, home: &str) -> Result<Vec<FuneralRecord>> {
            self.readers.lock().unwrap().push(std::thread::current().id());
            self.inner.active_funerals(home)
        }
        fn active_in_room(&self, home: &str, room: RoomNumber) -> Result<Option<FuneralRecord>> {
            self.inner.active_in_room(home, room)
        }
        fn funeral(&self, id: &str) -> Result<Option<FuneralRecord>> {
            self.inner.funeral(id)
        }
        fn insert_funeral(&self, record: &FuneralRecord) -> Result<FuneralRecord> {
            self.inner.insert_funeral(record)
        }
        fn update_funeral(&self, record: &FuneralRecord) -> Result<FuneralRecord> {
            self.inner.update_funeral(record)
        }
        fn set_funeral_room(&self, id: &str, room: RoomNumber) -> Result<()> {
            self.inner.set_funeral_room(id, room)
        }
        fn delete_funeral(&self, id: &str) -> Result<bool> {
            self.inner.delete_funeral(id)
        }
        fn insert_announcement(
            &self,
            record: &FuneralRecord,
            archived_at: DateTime<Utc>,
        ) -> Result<crate::model::Announcement> {
            self.inner.insert_announcement(record, archived_at)
        }
        fn announcements(&self, home: &str) -> Result<Vec<crate::model::Announcement>> {
            self.inner.announcements(home)
        }
        fn announcement(&self, id: &str) -> Result<Option<crate::model::Announcement>> {
            self.inner.announcement(id)
        }
        fn delete_announcement(&self, id: &str) -> Result<bool> {
            self.inner.delete_announcement(id)
        }
        fn condolences(&self, home: &str, room: RoomNumber) -> Result<Vec<CondolenceMessage>> {
            self.inner.condolences(home, room)
        }
        fn insert_condolence(&self, message: &NewCondolence) -> Result<CondolenceMessage> {
            self.inner.insert_condolence(message)
        }
        fn delete_condolences(&self, home: &str, room: RoomNumber) -> Result<usize> {
            self.inner.delete_condolences(home, room)
        }
        fn enshrined(&self, home: &str) -> Result<Vec<crate::model::EnshrinedRecord>> {
            self.inner.enshrined(home)
        }
        fn enshrined_record(&self, id: &str) -> Result<Option<crate::model::EnshrinedRecord>> {
            self.inner.enshrined_record(id)
        }
        fn insert_enshrined(&self, record: &crate::model::EnshrinedRecord) -> Result<()> {
            self.inner.insert_enshrined(record)
        }
        fn update_enshrined(&self, record: &crate::model::EnshrinedRecord) -> Result<()> {
            self.inner.update_enshrined(record)
        }
        fn delete_enshrined(&self, id: &str) -> Result<bool> {
            self.inner.delete_enshrined(id)
        }
    }

    #[tokio::test]
    async fn test_poller_reads_storage_off_the_runtime_thread() {
        let shared = SharedStorage::new(Storage::open_in_memory().unwrap());
        seed(&shared, 1, "홍길동");
        let backend = ThreadRecordingBackend {
            inner: shared,
            readers: Arc::default(),
        };
        let readers = Arc::clone(&backend.readers);
        let hub = BoardHub::new();

        let handle = spawn_poller(
            backend,
            hub.clone(),
            vec!["home-1".to_string()],
            Duration::from_secs(10),
            Duration::from_secs(15),
        );
        for _ in 0..200 {
            if hub.view("home-1", "x").unwrap().total == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(hub.view("home-1", "x").unwrap().total, 1);
        let readers = readers.lock().unwrap();
        assert!(!readers.is_empty());
        // The test runtime is single-threaded: reads on this thread would
        // mean the poller ran them on the async worker.
        assert!(readers.iter().all(|id| *id != std::thread::current().id()));
    }
}

//! このモジュールは、可変長の文字列配列を一要素ずつ取り出すための「遅延コレクション」を提供します。
//!
//! 生産者 (現在はファイル名グロブと、Rust 側から渡される文字列リスト) が結果の配列を
//! セッションとして登録し、ホストには不透明なハンドルだけを返します。
//! ホストは `collection_next` をハンドルが null に戻るまで繰り返し呼び出します。
//! 配列を使い切った時点でセッションとその裏付けデータは解放され、ハンドルは無効になります。
//!
//! ハンドルは世代付きのインデックスであり、解放済み・偽造されたハンドルは
//! 通常の終端とは区別して `CollectionError::CorruptHandle` として検出されます。
mod glob;
pub use glob::*;

use std::ffi::{CStr, CString, c_void};
use std::num::NonZeroUsize;
use std::os::raw::c_char;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::error::{SvlibError, SvlibResult};

const INDEX_BITS: u32 = usize::BITS / 2;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: usize = usize::MAX >> INDEX_BITS;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CollectionError {
    #[error("out of memory while creating a collection handle")]
    OutOfMemory,
    #[error("collection handle {0:#x} does not name a live collection")]
    CorruptHandle(usize),
}

impl CollectionError {
    pub fn code(&self) -> i32 {
        match self {
            CollectionError::OutOfMemory => libc::ENOMEM,
            CollectionError::CorruptHandle(_) => libc::EBADF,
        }
    }
}

/// ホストへ渡す不透明なハンドル。
///
/// 下位ビットがスロット番号 + 1、上位ビットがスロットの世代です。
/// 0 (null) になることはありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroUsize);

impl Handle {
    fn new(index: usize, generation: usize) -> Option<Self> {
        if index >= INDEX_MASK {
            return None;
        }
        let raw = ((generation & GENERATION_MASK) << INDEX_BITS) | (index + 1);
        NonZeroUsize::new(raw).map(Handle)
    }

    fn index(self) -> usize {
        (self.0.get() & INDEX_MASK).wrapping_sub(1)
    }

    fn generation(self) -> usize {
        self.0.get() >> INDEX_BITS
    }

    /// ハンドルの整数表現。
    pub fn to_bits(self) -> usize {
        self.0.get()
    }

    /// `chandle` としてホストへ渡すための値。
    pub fn into_raw(self) -> *mut c_void {
        std::ptr::without_provenance_mut(self.0.get())
    }

    /// ホストから受け取った `chandle` を解釈します。null は `None` です。
    /// 値が生きているセッションを指しているかどうかは検証しません。
    pub fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonZeroUsize::new(raw.addr()).map(Handle)
    }
}

/// セッションが所有する配列本体。生産者ごとに一つのバリアントがあり、
/// `Drop` でそれぞれのデータが解放されます。
pub enum Backing {
    Glob(GlobResult),
    Strings(Vec<CString>),
}

impl Backing {
    pub fn len(&self) -> usize {
        match self {
            Backing::Glob(g) => g.len(),
            Backing::Strings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&CStr> {
        match self {
            Backing::Glob(g) => g.get(index),
            Backing::Strings(v) => v.get(index).map(CString::as_c_str),
        }
    }
}

struct Session {
    backing: Backing,
    cursor: usize,
    /// 診断用のタグ。
    tag: i32,
    /// 別のセッションへのつなぎ。表はこの値を解釈しません。
    link: Option<Handle>,
}

impl Session {
    fn new(backing: Backing) -> Self {
        Self {
            backing,
            cursor: 0,
            tag: 0,
            link: None,
        }
    }
}

struct Slot {
    generation: usize,
    session: Option<Session>,
}

/// 生きているセッションの表。
pub struct SessionTable {
    slots: Vec<Slot>,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTable {
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// `backing` を所有するセッションを登録し、そのハンドルを返します。
    ///
    /// 表を伸長できない場合、`backing` は解放されて `OutOfMemory` を返します。
    pub fn create(&mut self, backing: Backing) -> Result<Handle, CollectionError> {
        // 空いているスロットを先に使う
        if let Some(index) = self.slots.iter().position(|s| s.session.is_none()) {
            let slot = &mut self.slots[index];
            slot.generation = slot.generation.wrapping_add(1) & GENERATION_MASK;
            let handle = Handle::new(index, slot.generation).ok_or(CollectionError::OutOfMemory)?;
            slot.session = Some(Session::new(backing));
            return Ok(handle);
        }
        let index = self.slots.len();
        self.slots
            .try_reserve(1)
            .map_err(|_| CollectionError::OutOfMemory)?;
        let handle = Handle::new(index, 1).ok_or(CollectionError::OutOfMemory)?;
        self.slots.push(Slot {
            generation: 1,
            session: Some(Session::new(backing)),
        });
        Ok(handle)
    }

    fn session(&self, handle: Handle) -> Result<&Session, CollectionError> {
        let corrupt = CollectionError::CorruptHandle(handle.to_bits());
        self.slots
            .get(handle.index())
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.session.as_ref())
            .ok_or(corrupt)
    }

    fn session_mut(&mut self, handle: Handle) -> Result<&mut Session, CollectionError> {
        let corrupt = CollectionError::CorruptHandle(handle.to_bits());
        let slot = self.slots.get_mut(handle.index()).ok_or(corrupt)?;
        if slot.generation != handle.generation() {
            return Err(corrupt);
        }
        slot.session.as_mut().ok_or(corrupt)
    }

    /// ハンドルが生きているセッションを指しているか。
    pub fn contains(&self, handle: Handle) -> bool {
        self.session(handle).is_ok()
    }

    pub fn tag(&self, handle: Handle) -> Result<i32, CollectionError> {
        self.session(handle).map(|s| s.tag)
    }

    pub fn set_tag(&mut self, handle: Handle, tag: i32) -> Result<(), CollectionError> {
        self.session_mut(handle)?.tag = tag;
        Ok(())
    }

    pub fn link(&self, handle: Handle) -> Result<Option<Handle>, CollectionError> {
        self.session(handle).map(|s| s.link)
    }

    /// `handle` のセッションに別のハンドルをつなぎます。
    /// つないだ先のセッションの寿命は管理しません。
    pub fn set_link(&mut self, handle: Handle, link: Option<Handle>) -> Result<(), CollectionError> {
        self.session_mut(handle)?.link = link;
        Ok(())
    }

    /// 生きているセッションの数。
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.session.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 次の要素を返します。
    ///
    /// - `*handle` が `None` なら何もせず `Ok(None)`。
    /// - 無効なハンドルなら `CorruptHandle` (ハンドルはそのまま)。
    /// - 配列を使い切っていれば、セッションを解放し `*handle` を `None` にして `Ok(None)`。
    pub fn next(&mut self, handle: &mut Option<Handle>) -> Result<Option<&CStr>, CollectionError> {
        let Some(h) = *handle else {
            return Ok(None);
        };
        let exhausted = {
            let session = self.session_mut(h)?;
            if session.cursor < session.backing.len() {
                session.cursor += 1;
                false
            } else {
                true
            }
        };
        if exhausted {
            self.slots[h.index()].session = None;
            *handle = None;
            return Ok(None);
        }
        let session = self.session_mut(h)?;
        Ok(session.backing.get(session.cursor - 1))
    }

    /// 使い切る前にセッションを破棄します。
    pub fn release(&mut self, handle: Handle) -> Result<(), CollectionError> {
        self.session_mut(handle)?;
        self.slots[handle.index()].session = None;
        Ok(())
    }
}

/// プロセス全体で共有されるセッション表。
/// 各セッションの状態はハンドルが保持するので、セッションごとに独立して進められます。
static SESSIONS: Mutex<SessionTable> = Mutex::new(SessionTable::new());

/// 共有セッション表を借りて `f` を実行します。
pub fn with_sessions<R>(f: impl FnOnce(&mut SessionTable) -> R) -> R {
    let mut guard = SESSIONS.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// 共有セッション表から次の要素をコピーして取り出します。
pub fn collection_next(handle: &mut Option<Handle>) -> Result<Option<CString>, CollectionError> {
    with_sessions(|t| t.next(handle).map(|s| s.map(CStr::to_owned)))
}

/// 境界用: 要素をコピーせず、セッションが所有する文字列へのポインタを返します。
///
/// ポインタはそのセッションが解放されるまで有効です。終端では null を返します。
pub(crate) fn collection_next_raw(
    handle: &mut Option<Handle>,
) -> Result<*const c_char, CollectionError> {
    with_sessions(|t| {
        t.next(handle)
            .map(|s| s.map_or(std::ptr::null(), CStr::as_ptr))
    })
}

/// Rust 側で用意した文字列のリストをコレクションとして登録します。
///
/// 空のリストはグロブの「一致なし」と同じく、ハンドルなし・件数 0 になります。
pub fn collect_strings<I, S>(items: I) -> SvlibResult<(Option<Handle>, u32)>
where
    I: IntoIterator<Item = S>,
    S: Into<Vec<u8>>,
{
    let strings = items
        .into_iter()
        .map(CString::new)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| SvlibError::InvalidArgument("string contains an interior NUL byte"))?;
    if strings.is_empty() {
        return Ok((None, 0));
    }
    let count = u32::try_from(strings.len()).unwrap_or(u32::MAX);
    let handle = with_sessions(|t| t.create(Backing::Strings(strings)))?;
    Ok((Some(handle), count))
}

//! 去抖计时器
//!
//! 每个监测条件一个槽位，状态机：
//! Idle（空闲）→ Pending（等待到期）→ Fired（已触发）→ Idle
//!
//! - 槽位非 Idle 时再次 arm 是空操作，保证每个条件至多一个计时器
//! - clear 幂等：对已触发或已取消的槽位清除不会出错
//! - Fired 仍占用槽位，直到条件解除时被 clear；说话检测触发后直接回到 Idle
//!
//! 计时器由外部时钟通过 `take_due` 推进，不依赖后台回调。

use chrono::{DateTime, Duration, Utc};

use crate::proctor::types::ViolationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    EyesClosed,
    GazeAway,
    NoFace,
    Talking,
}

impl Condition {
    pub const ALL: [Condition; 4] = [
        Condition::EyesClosed,
        Condition::GazeAway,
        Condition::NoFace,
        Condition::Talking,
    ];

    fn index(self) -> usize {
        match self {
            Self::EyesClosed => 0,
            Self::GazeAway => 1,
            Self::NoFace => 2,
            Self::Talking => 3,
        }
    }

    /// 触发后是否立即释放槽位
    fn releases_on_fire(self) -> bool {
        matches!(self, Self::Talking)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EyesClosed => "eyes_closed",
            Self::GazeAway => "gaze_away",
            Self::NoFace => "no_face",
            Self::Talking => "talking",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceSlot {
    #[default]
    Idle,
    Pending {
        deadline: DateTime<Utc>,
        kind: ViolationKind,
    },
    Fired,
}

impl DebounceSlot {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// 到期待发的违规
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueViolation {
    pub condition: Condition,
    pub deadline: DateTime<Utc>,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionTimers {
    slots: [DebounceSlot; 4],
}

impl DetectionTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, condition: Condition) -> DebounceSlot {
        self.slots[condition.index()]
    }

    pub fn is_active(&self, condition: Condition) -> bool {
        !self.slot(condition).is_idle()
    }

    /// 槽位空闲时启动计时器，返回是否真正启动
    pub fn arm(
        &mut self,
        condition: Condition,
        now: DateTime<Utc>,
        delay_ms: i64,
        kind: ViolationKind,
    ) -> bool {
        let slot = &mut self.slots[condition.index()];
        if !slot.is_idle() {
            return false;
        }
        // 超出时间范围时钉在最大时刻，等同永不到期
        let deadline = Duration::try_milliseconds(delay_ms)
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        *slot = DebounceSlot::Pending { deadline, kind };
        tracing::trace!(condition = condition.as_str(), delay_ms, "Debounce timer armed");
        true
    }

    pub fn clear(&mut self, condition: Condition) {
        let slot = &mut self.slots[condition.index()];
        if matches!(slot, DebounceSlot::Pending { .. }) {
            tracing::trace!(condition = condition.as_str(), "Debounce timer cancelled");
        }
        *slot = DebounceSlot::Idle;
    }

    pub fn cancel_all(&mut self) {
        for condition in Condition::ALL {
            self.clear(condition);
        }
    }

    /// 取出所有 `deadline <= now` 的计时器，按到期时间排序
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<DueViolation> {
        let mut due = Vec::new();
        for condition in Condition::ALL {
            let slot = &mut self.slots[condition.index()];
            if let DebounceSlot::Pending { deadline, kind } = *slot {
                if deadline <= now {
                    *slot = if condition.releases_on_fire() {
                        DebounceSlot::Idle
                    } else {
                        DebounceSlot::Fired
                    };
                    due.push(DueViolation {
                        condition,
                        deadline,
                        kind,
                    });
                }
            }
        }
        due.sort_by_key(|d| d.deadline);
        due
    }
}

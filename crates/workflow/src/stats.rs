//! 롤링 통계 — 고정 윈도우 z-score
//!
//! [`RollingWindow`]는 마지막 w개 관측치의 평균/표준편차를 유지하고,
//! [`RollingZScore`]는 새 관측치가 자기 윈도우(자신 포함) 안에서 몇
//! 표준편차 떨어져 있는지 계산합니다. 표준편차는 표본(Bessel 보정)
//! 기준입니다.
//!
//! 윈도우가 차기 전의 위치는 점수가 없고 (`None`), 윈도우 내 분산이
//! 0이면 점수는 0.0입니다 — 변동 없는 시퀀스는 이상치가 아닙니다.

use std::collections::VecDeque;

use logsift_core::metrics::{LABEL_STAGE, WORKFLOW_SCORE_SKIPPED_TOTAL};
use logsift_core::frame::Frame;
use logsift_core::pipeline::Transform;
use logsift_core::types::{Field, FieldType, Value};

use crate::error::WorkflowError;

/// 윈도우 크기 하한 — 표본 표준편차에는 관측치 2개가 필요합니다.
pub const MIN_WINDOW: usize = 2;

/// 고정 크기 FIFO 관측 윈도우
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// 크기 `capacity`의 윈도우를 생성합니다. `capacity < 2`는 거부됩니다.
    pub fn new(capacity: usize) -> Result<Self, WorkflowError> {
        if capacity < MIN_WINDOW {
            return Err(WorkflowError::Statistics(format!(
                "window size must be >= {MIN_WINDOW}, got {capacity}"
            )));
        }
        Ok(Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// 관측치를 추가합니다. 윈도우가 가득 차면 가장 오래된 값이 밀려납니다.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// 윈도우가 가득 찼는지 확인합니다.
    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// 현재 관측치 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 윈도우가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 윈도우 평균을 반환합니다. 비어 있으면 `None`.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// 표본 표준편차(Bessel 보정)를 반환합니다. 관측치가 2개 미만이면 `None`.
    pub fn stddev(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        Some(variance.sqrt())
    }
}

/// 스트리밍 롤링 z-score 계산기
///
/// 배치 경계를 넘어 윈도우를 유지하므로 스트림 워크플로우에서
/// 배치마다 새로 시작하지 않습니다.
#[derive(Debug, Clone)]
pub struct RollingZScore {
    window: RollingWindow,
}

impl RollingZScore {
    /// 윈도우 크기 `capacity`의 계산기를 생성합니다.
    pub fn new(capacity: usize) -> Result<Self, WorkflowError> {
        Ok(Self {
            window: RollingWindow::new(capacity)?,
        })
    }

    /// 관측치를 넣고, 윈도우가 차 있으면 z-score를 반환합니다.
    ///
    /// 점수는 새 관측치를 포함한 윈도우 기준입니다. 윈도우 내 분산이
    /// 0이면 0.0을 반환합니다.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.window.push(value);
        if !self.window.is_full() {
            return None;
        }
        let mean = self.window.mean()?;
        let stddev = self.window.stddev()?;
        if stddev == 0.0 {
            return Some(0.0);
        }
        Some((value - mean) / stddev)
    }
}

/// 시퀀스 전체에 대한 롤링 z-score를 한 번에 계산합니다.
///
/// 결과 길이는 입력과 같습니다. 윈도우가 차기 전의 위치는 `None`입니다.
pub fn rolling_zscore(values: &[f64], window: usize) -> Result<Vec<Option<f64>>, WorkflowError> {
    let mut scorer = RollingZScore::new(window)?;
    Ok(values.iter().map(|&v| scorer.push(v)).collect())
}

/// 롤링 z-score 컬럼을 부여하는 변환 단계
///
/// 숫자가 아닌 값(`Null` 포함)은 윈도우에 들어가지 않고 점수도
/// `Null`이 됩니다. 계산기 상태는 배치 사이에 유지됩니다.
pub struct RollingScoreStage {
    column: String,
    output_column: String,
    scorer: RollingZScore,
    skipped: u64,
}

impl RollingScoreStage {
    /// 입력 컬럼, 윈도우 크기, 출력 컬럼 이름으로 단계를 생성합니다.
    pub fn new(
        column: impl Into<String>,
        window: usize,
        output_column: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        Ok(Self {
            column: column.into(),
            output_column: output_column.into(),
            scorer: RollingZScore::new(window)?,
            skipped: 0,
        })
    }

    /// 숫자가 아니어서 점수를 받지 못한 누적 행 수를 반환합니다.
    pub fn skipped_rows(&self) -> u64 {
        self.skipped
    }
}

impl Transform for RollingScoreStage {
    fn name(&self) -> &str {
        "zscore"
    }

    fn apply(&mut self, frame: Frame) -> Result<Frame, logsift_core::LogsiftError> {
        let values = frame.numeric_column(&self.column)?;
        let mut scores = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Some(v) => scores.push(
                    self.scorer
                        .push(v)
                        .map_or(Value::Null, Value::Float),
                ),
                None => {
                    // 행은 유지된다 — 점수만 빠질 뿐 드롭이 아니다
                    self.skipped += 1;
                    metrics::counter!(WORKFLOW_SCORE_SKIPPED_TOTAL, LABEL_STAGE => "zscore")
                        .increment(1);
                    scores.push(Value::Null);
                }
            }
        }

        let scored = frame.with_column(
            Field::new(&self.output_column, FieldType::Float),
            scores,
        )?;
        Ok(scored)
    }
}

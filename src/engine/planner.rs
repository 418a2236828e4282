// ==========================================
// 孵化机产能分配系统 - 分配建议引擎
// ==========================================
// 职责: 给定总蛋数 + 候选机器可用产能，给出拆分建议
// 红线: 建议只是启发式结果，落库前必须经 AllocationLedger 重新校验
// 说明: 策略可插拔，切换策略不影响账本的不变量校验
// ==========================================

use crate::domain::position::Position;
use crate::engine::capacity_resolver::CapacityInfo;
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::position_catalog::PositionCatalog;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

// ==========================================
// AllocationStrategy - 拆分策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// 按可用产能降序贪心装箱
    LargestFirst,
    /// 优先整批放入一台机器（最紧凑的那台），否则退化为贪心
    FewestFragments,
}

impl AllocationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStrategy::LargestFirst => "largest_first",
            AllocationStrategy::FewestFragments => "fewest_fragments",
        }
    }

    pub fn title_cn(&self) -> &'static str {
        match self {
            AllocationStrategy::LargestFirst => "大机优先",
            AllocationStrategy::FewestFragments => "最少拆分",
        }
    }

    pub fn planner(&self) -> Box<dyn AllocationPlanner> {
        match self {
            AllocationStrategy::LargestFirst => Box::new(LargestFirstPlanner),
            AllocationStrategy::FewestFragments => Box::new(FewestFragmentsPlanner),
        }
    }
}

impl Default for AllocationStrategy {
    fn default() -> Self {
        AllocationStrategy::LargestFirst
    }
}

impl std::str::FromStr for AllocationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "largest_first" | "largest-first" | "greedy" => Ok(AllocationStrategy::LargestFirst),
            "fewest_fragments" | "fewest-fragments" => Ok(AllocationStrategy::FewestFragments),
            other => Err(format!("未知分配策略: {}", other)),
        }
    }
}

// ==========================================
// AllocationPlan - 拆分建议
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLine {
    pub machine_id: String,
    pub eggs: i64,
    pub suggested_positions: Vec<Position>, // 单机模式为空
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub strategy: AllocationStrategy,
    pub total_eggs: i64,
    pub lines: Vec<PlanLine>,
}

impl AllocationPlan {
    pub fn planned_eggs(&self) -> i64 {
        self.lines.iter().map(|l| l.eggs).sum()
    }
}

// ==========================================
// Trait: AllocationPlanner
// ==========================================
pub trait AllocationPlanner: Send + Sync {
    fn strategy(&self) -> AllocationStrategy;

    /// 给出拆分建议
    ///
    /// # 错误
    /// - Validation: 总蛋数 <= 0 或候选重复
    /// - InsufficientCapacity: 候选可用产能之和不足
    fn suggest_split(
        &self,
        total_eggs: i64,
        candidates: &[CapacityInfo],
    ) -> AllocationResult<AllocationPlan>;
}

/// 公共前置校验，返回可用产能之和
fn check_candidates(total_eggs: i64, candidates: &[CapacityInfo]) -> AllocationResult<i64> {
    if total_eggs <= 0 {
        return Err(AllocationError::Validation(format!(
            "总蛋数必须大于0: {}",
            total_eggs
        )));
    }

    let mut seen = HashSet::new();
    for c in candidates {
        if !seen.insert(c.machine_id.as_str()) {
            return Err(AllocationError::Validation(format!(
                "候选机器重复: {}",
                c.machine_id
            )));
        }
    }

    let available: i64 = candidates.iter().map(|c| c.available_capacity.max(0)).sum();
    if available < total_eggs {
        return Err(AllocationError::InsufficientCapacity {
            requested: total_eggs,
            available,
        });
    }
    Ok(available)
}

/// 为一台机器生成建议行（多段机附带位置建议）
fn plan_line(info: &CapacityInfo, eggs: i64) -> PlanLine {
    let suggested_positions = if info.available_positions.is_empty() {
        Vec::new()
    } else {
        PositionCatalog::pick_positions(eggs, info.machine_capacity, &info.available_positions)
            .unwrap_or_else(|| info.available_positions.clone())
    };
    PlanLine {
        machine_id: info.machine_id.clone(),
        eggs,
        suggested_positions,
    }
}

/// 按可用产能降序（同值按机器ID升序）贪心装箱
fn greedy_lines(total_eggs: i64, candidates: &[CapacityInfo]) -> Vec<PlanLine> {
    let mut ordered: Vec<&CapacityInfo> = candidates
        .iter()
        .filter(|c| c.available_capacity > 0)
        .collect();
    ordered.sort_by(|a, b| {
        b.available_capacity
            .cmp(&a.available_capacity)
            .then_with(|| a.machine_id.cmp(&b.machine_id))
    });

    let mut remaining = total_eggs;
    let mut lines = Vec::new();
    for info in ordered {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(info.available_capacity);
        lines.push(plan_line(info, take));
        remaining -= take;
    }
    lines
}

// ==========================================
// LargestFirstPlanner - 大机优先贪心
// ==========================================
pub struct LargestFirstPlanner;

impl AllocationPlanner for LargestFirstPlanner {
    fn strategy(&self) -> AllocationStrategy {
        AllocationStrategy::LargestFirst
    }

    fn suggest_split(
        &self,
        total_eggs: i64,
        candidates: &[CapacityInfo],
    ) -> AllocationResult<AllocationPlan> {
        let available = check_candidates(total_eggs, candidates)?;
        let lines = greedy_lines(total_eggs, candidates);
        debug!(total_eggs, available, lines = lines.len(), "大机优先拆分完成");
        Ok(AllocationPlan {
            strategy: self.strategy(),
            total_eggs,
            lines,
        })
    }
}

// ==========================================
// FewestFragmentsPlanner - 最少拆分
// ==========================================
pub struct FewestFragmentsPlanner;

impl AllocationPlanner for FewestFragmentsPlanner {
    fn strategy(&self) -> AllocationStrategy {
        AllocationStrategy::FewestFragments
    }

    fn suggest_split(
        &self,
        total_eggs: i64,
        candidates: &[CapacityInfo],
    ) -> AllocationResult<AllocationPlan> {
        check_candidates(total_eggs, candidates)?;

        // 能整批装下的机器里选剩余最少的，把大机留给后续批次
        let single_fit = candidates
            .iter()
            .filter(|c| c.available_capacity >= total_eggs)
            .min_by(|a, b| {
                a.available_capacity
                    .cmp(&b.available_capacity)
                    .then_with(|| a.machine_id.cmp(&b.machine_id))
            });

        let lines = match single_fit {
            Some(info) => vec![plan_line(info, total_eggs)],
            None => greedy_lines(total_eggs, candidates),
        };
        debug!(total_eggs, lines = lines.len(), "最少拆分完成");
        Ok(AllocationPlan {
            strategy: self.strategy(),
            total_eggs,
            lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::DateRange;
    use crate::domain::types::MachineMode;
    use chrono::NaiveDate;

    fn single(id: &str, available: i64) -> CapacityInfo {
        CapacityInfo {
            machine_id: id.to_string(),
            mode: MachineMode::Single,
            machine_capacity: available.max(1),
            date_range: DateRange::incubation(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            available_capacity: available,
            available_positions: Vec::new(),
            occupied_positions: Vec::new(),
        }
    }

    fn multi_empty(id: &str, capacity: i64) -> CapacityInfo {
        CapacityInfo {
            machine_id: id.to_string(),
            mode: MachineMode::Multi,
            machine_capacity: capacity,
            date_range: DateRange::incubation(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            available_capacity: capacity,
            available_positions: PositionCatalog::all_positions().to_vec(),
            occupied_positions: Vec::new(),
        }
    }

    #[test]
    fn test_largest_first_splits_by_descending_capacity() {
        let candidates = vec![single("S1", 10000), single("S2", 30000), single("S3", 20000)];
        let plan = LargestFirstPlanner.suggest_split(45000, &candidates).unwrap();

        let split: Vec<(&str, i64)> = plan.lines.iter().map(|l| (l.machine_id.as_str(), l.eggs)).collect();
        assert_eq!(split, vec![("S2", 30000), ("S3", 15000)]);
        assert_eq!(plan.planned_eggs(), 45000);
    }

    #[test]
    fn test_planner_never_exceeds_available() {
        let candidates = vec![single("S1", 7000), single("S2", 7000), single("S3", 0), single("S4", 3000)];
        for strategy in [AllocationStrategy::LargestFirst, AllocationStrategy::FewestFragments] {
            let plan = strategy.planner().suggest_split(16500, &candidates).unwrap();
            assert_eq!(plan.planned_eggs(), 16500);
            for line in &plan.lines {
                let info = candidates.iter().find(|c| c.machine_id == line.machine_id).unwrap();
                assert!(line.eggs <= info.available_capacity);
                assert!(line.eggs > 0);
            }
        }
    }

    #[test]
    fn test_insufficient_capacity() {
        let candidates = vec![single("S1", 1000), single("S2", 2000)];
        let err = LargestFirstPlanner.suggest_split(3001, &candidates).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientCapacity {
                requested: 3001,
                available: 3000
            }
        );
    }

    #[test]
    fn test_invalid_total_and_duplicate_candidates() {
        let candidates = vec![single("S1", 1000)];
        assert!(matches!(
            LargestFirstPlanner.suggest_split(0, &candidates),
            Err(AllocationError::Validation(_))
        ));
        let dup = vec![single("S1", 1000), single("S1", 1000)];
        assert!(matches!(
            LargestFirstPlanner.suggest_split(500, &dup),
            Err(AllocationError::Validation(_))
        ));
    }

    #[test]
    fn test_fewest_fragments_prefers_tightest_single_machine() {
        let candidates = vec![single("S1", 50000), single("S2", 12000), single("S3", 9000)];
        let plan = FewestFragmentsPlanner.suggest_split(10000, &candidates).unwrap();
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].machine_id, "S2");
    }

    #[test]
    fn test_multi_mode_line_suggests_positions() {
        let candidates = vec![multi_empty("M1", 18000)];
        let plan = LargestFirstPlanner.suggest_split(3500, &candidates).unwrap();
        let line = &plan.lines[0];
        assert_eq!(line.suggested_positions.len(), 4);
        assert_eq!(line.suggested_positions[0].key(), "A-Left-Top");
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("greedy".parse::<AllocationStrategy>().unwrap(), AllocationStrategy::LargestFirst);
        assert_eq!(
            "fewest-fragments".parse::<AllocationStrategy>().unwrap(),
            AllocationStrategy::FewestFragments
        );
        assert!("random".parse::<AllocationStrategy>().is_err());
    }
}

//! Occupational taxonomy: prompts, reply parsing and built-in fallback lists.
//!
//! The lookup asks the upstream model for a JSON list. Anything that cannot be
//! turned into a non-empty list of names is answered from the lists below.

use serde::Serialize;
use serde_json::Value;

use crate::domain::ChatMessage;

/// Sampling temperature for taxonomy prompts.
pub const TAXONOMY_TEMPERATURE: f64 = 0.2;

const SYSTEM_PROMPT: &str = "你是中国职业分类专家。只返回纯JSON，不要代码块或解释。";

const INDUSTRIES_PROMPT: &str = "请给出中国语境的行业分类列表，最多60项。JSON对象结构：{\"industries\": [{\"id\": string, \"name\": string, \"aliases\": string[]}] }。行业名称规范、去重。";

/// Industries returned when the upstream lookup fails.
pub const FALLBACK_INDUSTRIES: &[&str] = &[
    "人工智能",
    "互联网",
    "金融科技",
    "生物医药",
    "新能源",
    "航空航天",
    "电子通信",
    "机械制造",
    "化工材料",
    "土木建筑",
    "环境工程",
    "教育",
    "医疗健康",
    "物流供应链",
    "零售电商",
    "文化传媒",
    "游戏",
    "汽车制造",
    "半导体",
    "云计算",
    "大数据",
    "网络安全",
    "法律服务",
    "咨询",
    "人力资源",
    "房地产/物业",
    "酒店旅游",
    "餐饮服务",
    "农业科技",
    "公共服务/政府",
    "保险",
    "银行",
    "证券",
    "广告营销",
    "内容创作",
    "体育与健身",
    "互联网金融",
    "跨境电商",
];

/// Positions for industries without a dedicated fallback list.
pub const GENERIC_POSITIONS: &[&str] = &[
    "产品经理",
    "项目经理",
    "数据分析师",
    "运营专员",
    "销售顾问",
    "市场专员",
    "客户成功经理",
];

const FALLBACK_POSITIONS: &[(&str, &[&str])] = &[
    (
        "人工智能",
        &[
            "AI产品经理",
            "机器学习工程师",
            "算法工程师",
            "数据科学家",
            "AI研究员",
            "计算机视觉工程师",
            "自然语言处理工程师",
            "芯片研发工程师",
        ],
    ),
    (
        "互联网",
        &[
            "产品经理",
            "前端工程师",
            "后端工程师",
            "全栈工程师",
            "UI/UX设计师",
            "运营专员",
            "数据分析师",
            "测试工程师",
        ],
    ),
    (
        "金融科技",
        &[
            "量化分析师",
            "风控专员",
            "金融产品经理",
            "区块链工程师",
            "投资顾问",
            "财务分析师",
            "合规专员",
            "金融数据分析师",
        ],
    ),
    (
        "生物医药",
        &[
            "生物信息工程师",
            "药物研发工程师",
            "临床研究员",
            "医疗器械工程师",
            "生物统计师",
            "药事专员",
            "质量控制专员",
            "医学编辑",
        ],
    ),
    (
        "新能源",
        &[
            "电池工程师",
            "新能源汽车工程师",
            "光伏工程师",
            "储能系统工程师",
            "充电桩工程师",
            "能源管理师",
            "电力系统工程师",
            "新材料研发工程师",
        ],
    ),
    (
        "航空航天",
        &[
            "航空发动机工程师",
            "飞行器设计工程师",
            "航天器结构工程师",
            "导航控制工程师",
            "航空材料工程师",
            "卫星通信工程师",
            "火箭推进工程师",
            "航空电子工程师",
        ],
    ),
    (
        "电子通信",
        &[
            "射频工程师",
            "通信协议工程师",
            "5G网络工程师",
            "信号处理工程师",
            "嵌入式工程师",
            "硬件设计工程师",
            "天线设计工程师",
            "光通信工程师",
        ],
    ),
    (
        "机械制造",
        &[
            "机械设计工程师",
            "工艺工程师",
            "自动化工程师",
            "精密制造工程师",
            "模具设计工程师",
            "数控编程工程师",
            "质量工程师",
            "设备维护工程师",
        ],
    ),
    (
        "化工材料",
        &[
            "化工工艺工程师",
            "材料研发工程师",
            "高分子材料工程师",
            "催化剂工程师",
            "环保工程师",
            "安全工程师",
            "分析化学工程师",
            "纳米材料工程师",
        ],
    ),
    (
        "土木建筑",
        &[
            "结构工程师",
            "建筑设计师",
            "岩土工程师",
            "道路桥梁工程师",
            "建筑施工工程师",
            "BIM工程师",
            "工程造价师",
            "城市规划师",
        ],
    ),
    (
        "环境工程",
        &[
            "环境监测工程师",
            "污水处理工程师",
            "大气治理工程师",
            "固废处理工程师",
            "环境影响评价师",
            "碳排放管理师",
            "生态修复工程师",
            "清洁生产工程师",
        ],
    ),
    ("教育", &["教师", "教研员", "班主任", "培训师", "教育产品经理"]),
];

/// What a taxonomy lookup asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyKind {
    Industries,
    Positions { industry: String },
}

impl TaxonomyKind {
    /// Build from the raw query parameters.
    ///
    /// A missing `kind` means industries; any value other than `industries`
    /// means positions for `industry` (empty when absent).
    #[must_use]
    pub fn from_query(kind: Option<&str>, industry: Option<&str>) -> Self {
        match kind.map(str::trim) {
            None | Some("" | "industries") => Self::Industries,
            Some(_) => Self::Positions {
                industry: industry.unwrap_or_default().trim().to_string(),
            },
        }
    }

    /// Prompt pair for the upstream model.
    #[must_use]
    pub fn prompt_messages(&self) -> Vec<ChatMessage> {
        let user = match self {
            Self::Industries => INDUSTRIES_PROMPT.to_string(),
            Self::Positions { industry } => format!(
                "请列出行业“{industry}”的常见岗位/二级行业，最多60项。JSON对象结构：{{\"industry\": string, \"positions\": [{{\"id\": string, \"name\": string}}] }}。岗位名称贴合中国职场。"
            ),
        };
        vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
    }

    /// Built-in answer for this kind.
    #[must_use]
    pub fn fallback(&self) -> TaxonomyListing {
        match self {
            Self::Industries => TaxonomyListing::Industries {
                industries: to_owned(FALLBACK_INDUSTRIES),
                source: TaxonomySource::Fallback,
            },
            Self::Positions { industry } => TaxonomyListing::Positions {
                industry: industry.clone(),
                positions: to_owned(fallback_positions(industry)),
                source: TaxonomySource::Fallback,
            },
        }
    }

    /// Turn an upstream reply into a listing, or `None` when it holds no names.
    #[must_use]
    pub fn listing_from_reply(&self, content: &str) -> Option<TaxonomyListing> {
        let value: Value = serde_json::from_str(strip_code_fences(content)).ok()?;
        match self {
            Self::Industries => Some(TaxonomyListing::Industries {
                industries: extract_names(value.get("industries")?)?,
                source: TaxonomySource::Upstream,
            }),
            Self::Positions { industry } => Some(TaxonomyListing::Positions {
                industry: industry.clone(),
                positions: extract_names(value.get("positions")?)?,
                source: TaxonomySource::Upstream,
            }),
        }
    }
}

/// Where a listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaxonomySource {
    #[serde(rename = "deepseek")]
    Upstream,
    #[serde(rename = "fallback")]
    Fallback,
}

/// Response body of a taxonomy lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TaxonomyListing {
    Industries {
        industries: Vec<String>,
        source: TaxonomySource,
    },
    Positions {
        industry: String,
        positions: Vec<String>,
        source: TaxonomySource,
    },
}

impl TaxonomyListing {
    #[must_use]
    pub const fn source(&self) -> TaxonomySource {
        match self {
            Self::Industries { source, .. } | Self::Positions { source, .. } => *source,
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::Industries { industries, .. } => industries,
            Self::Positions { positions, .. } => positions,
        }
    }
}

/// Fallback positions for an industry, or the generic list.
#[must_use]
pub fn fallback_positions(industry: &str) -> &'static [&'static str] {
    FALLBACK_POSITIONS
        .iter()
        .find(|(name, _)| *name == industry)
        .map_or(GENERIC_POSITIONS, |(_, positions)| *positions)
}

/// Remove a leading ```` ```json ```` / ```` ``` ```` fence and a trailing ```` ``` ````.
#[must_use]
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

// Entries are either `{"name": ...}` objects or bare strings.
fn extract_names(list: &Value) -> Option<Vec<String>> {
    let names: Vec<String> = list
        .as_array()?
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() { None } else { Some(names) }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

//! Prompt templates and canned replies.

use crate::memory::NO_HISTORY;

pub const EMPTY_QUERY_MESSAGE: &str =
    "😯 你还没输入问题哦！可以问比如“承德避暑山庄门票”“保定驴肉火烧哪家正宗”～";

pub const VAGUE_QUERY_MESSAGE: &str = "💡 你可以具体问这些哦：\n\
1. 景点类：XX景点门票 / 开放时间 / 怎么去\n\
2. 美食类：XX城市特色美食 / 推荐店铺\n\
3. 行程类：河北X日游（亲子 / 老人 / 情侣）\n\
4. 实用类：预约方式 / 避坑指南 / 交通攻略";

pub const NO_KNOWLEDGE_MESSAGE: &str =
    "😅 抱歉，我的知识库里暂时没有相关信息，可以换个问法试试～";

const GROUNDING_RULES: &str = "\
【资料约束】
- 门票、交通、开放时间等一切事实只能取自【知识库内容】，不得补充资料以外的信息
- 资料未覆盖的细节写“以景区官方公布为准”，不要留空，也不要猜测
- 不要向用户提问，不要请用户补充信息或自行查询

【结尾】
- 只用一句总结收尾，不追问，不给后续选项";

/// Day-by-day itinerary prompt.
pub fn itinerary_prompt(context: &str, history: &str, query: &str, days: Option<u32>) -> String {
    let length = match days {
        Some(n) => format!("共 {} 天，按 Day 1 到 Day {} 依次输出", n, n),
        None => "按天输出（Day 1 / Day 2 / …），天数根据资料合理安排".to_string(),
    };

    format!(
        "你是河北旅游的行程规划引擎。请只依据下面的【知识库内容】，为用户写出一份拿来就能照着走的行程方案。\n\
\n\
【结构】\n\
- {length}\n\
- 每一天固定包含四个小节，缺一不可：\n\
  1. 今日行程概览：所在城市或区域，按游览顺序列出景点\n\
  2. 门票与消费：当天涉及的门票价格及观光车、游船等必要开销，金额原样引用资料\n\
  3. 交通方式：城市间与景点间怎么走，给出可执行的组合及大致耗时或费用\n\
  4. 执行提醒：预约与限流、老人亲子等人群注意事项、上午下午晚上的节奏\n\
\n\
{rules}\n\
\n\
【知识库内容】\n\
{context}\n\
\n\
【最近对话】\n\
{history}\n\
\n\
【用户需求】\n\
{query}\n\
\n\
直接输出行程正文。",
        length = length,
        rules = GROUNDING_RULES,
        context = context,
        history = history_or_none(history),
        query = query,
    )
}

/// Direct-answer prompt for single-fact questions such as ticket prices.
pub fn lookup_prompt(context: &str, history: &str, query: &str) -> String {
    format!(
        "你是河北旅游知识助手。请只依据下面的【知识库内容】直接回答用户的问题。\n\
\n\
【回答方式】\n\
- 开门见山给出答案，价格、时间、地址等数字与资料原文保持一致\n\
- 不要写成按天划分的行程，不使用 Day 1、Day 2 这类标题\n\
- 可以补充资料中与问题直接相关的注意事项，分点列出\n\
\n\
{rules}\n\
\n\
【知识库内容】\n\
{context}\n\
\n\
【最近对话】\n\
{history}\n\
\n\
【用户问题】\n\
{query}",
        rules = GROUNDING_RULES,
        context = context,
        history = history_or_none(history),
        query = query,
    )
}

/// Rephrase-only prompt for the style enhancer.
pub fn enhancement_prompt(answer: &str, query: &str) -> String {
    format!(
        "你是旅游产品的文案编辑。请改写下面的【原始回答】，让它读起来更像成熟产品的输出：\n\
- 事实一字不改，不增加原文没有的信息，数字原样保留\n\
- 用小标题加分点整理结构，原有的 Day 标题保持不变\n\
- 语气自然亲切，但不夸张\n\
\n\
【用户问题】\n\
{query}\n\
\n\
【原始回答】\n\
{answer}\n\
\n\
只输出改写后的正文，不要解释。",
        query = query,
        answer = answer,
    )
}

fn history_or_none(history: &str) -> &str {
    if history.trim().is_empty() {
        NO_HISTORY
    } else {
        history
    }
}

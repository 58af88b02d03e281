use std::sync::LazyLock;

use regex::Regex;

use super::{CompleteListing, IncrementalListing, Source};
use crate::parser::NumberFormat;

static RE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"疫苗接种情况").expect("invalid regex: link filter"));
static RE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"截至(20\d{2})年(\d{1,2})月(\d{1,2})日").expect("invalid regex: date")
});
static RE_DOSES_DAILY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d\.]+\s*万)剂次").expect("invalid regex: daily doses"));
static RE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"国务院联防联控机制(20\d\d)年(\d{1,2})月(\d{1,2})日新闻发布会文字实录")
        .expect("invalid regex: complete title")
});
static RE_DOSES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"截至(?P<month>\d{1,2})月(?P<day>\d{1,2})日[^。\n]*?计报告接种新冠疫苗(?P<big>[\d\.]+)亿(?P<small>[\d\.]+)万剂次",
    )
    .expect("invalid regex: complete doses")
});
static RE_PEOPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"接种总人数达(?P<big>[\d\.]+)亿(?P<small>[\d\.]+)万")
        .expect("invalid regex: people vaccinated")
});
static RE_FULLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"已完成全程接种(?P<big>[\d\.]+)亿(?P<small>[\d\.]+)万人，覆盖人数占全国总人口的")
        .expect("invalid regex: fully vaccinated")
});
static RE_BOOSTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"完成加强免疫接种(?P<big>[\d\.]+)亿(?P<small>[\d\.]+)万人，其中序贯加强免疫接种")
        .expect("invalid regex: boosters")
});

/// National Health Commission daily vaccination bulletins, plus the State
/// Council joint prevention press-conference transcripts.
pub(super) fn source() -> Source {
    Source {
        name: "china".to_string(),
        location: "China".to_string(),
        vaccine: "CanSino, Sinopharm/Beijing, Sinopharm/Wuhan, Sinovac, ZF2001".to_string(),
        number_format: NumberFormat::CHINESE,
        incremental: IncrementalListing {
            index_url: "http://www.nhc.gov.cn/xcs/yqjzqk/list_gzbd.shtml".to_string(),
            link_selector: "li>a".to_string(),
            link_filter: Some(RE_LINK.clone()),
            content_selector: "#xw_box".to_string(),
            date: RE_DATE.clone(),
            date_format: "%Y %m %d".to_string(),
            total_vaccinations: RE_DOSES_DAILY.clone(),
        },
        complete: Some(CompleteListing {
            index_url: "http://www.nhc.gov.cn/xcs/s2906/new_list.shtml".to_string(),
            link_selector: "li>a".to_string(),
            content_selector: "#xw_box".to_string(),
            title: RE_TITLE.clone(),
            title_format: "%Y %m %d".to_string(),
            doses: RE_DOSES.clone(),
            people_vaccinated: RE_PEOPLE.clone(),
            people_fully_vaccinated: RE_FULLY.clone(),
            total_boosters: RE_BOOSTERS.clone(),
            big_scale: 1e8,
            small_scale: 1e4,
            links: 3,
        }),
    }
}

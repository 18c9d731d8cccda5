//! Static table of supported library systems (Calil `systemid` codes).

use serde::Serialize;

/// A library system the availability service can be queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Municipality {
    pub code: &'static str,
    pub name: &'static str,
}

const fn m(code: &'static str, name: &'static str) -> Municipality {
    Municipality { code, name }
}

static MUNICIPALITIES: &[Municipality] = &[
    m("Tokyo_Adachi", "足立区"),
    m("Tokyo_Akiruno", "あきる野市"),
    m("Tokyo_Akishima", "昭島市"),
    m("Tokyo_Arakawa", "荒川区"),
    m("Tokyo_Bunkyo", "文京区"),
    m("Tokyo_Chiyoda", "千代田区"),
    m("Tokyo_Chofu", "調布市"),
    m("Tokyo_Chuo", "中央区"),
    m("Tokyo_Edogawa", "江戸川区"),
    m("Tokyo_Fuchu", "府中市"),
    m("Tokyo_Fussa", "福生市"),
    m("Tokyo_Hachijo", "八丈町"),
    m("Tokyo_Hachioji", "八王子市"),
    m("Tokyo_Hamura", "羽村市"),
    m("Tokyo_Higashikurume", "東久留米市"),
    m("Tokyo_Higashimurayama", "東村山市"),
    m("Tokyo_Higashiyamato", "東大和市"),
    m("Tokyo_Hino", "日野市"),
    m("Tokyo_Hinode", "日の出町"),
    m("Tokyo_Inagi", "稲城市"),
    m("Tokyo_Itabashi", "板橋区"),
    m("Tokyo_Katsushika", "葛飾区"),
    m("Tokyo_Kita", "北区"),
    m("Tokyo_Kiyose", "清瀬市"),
    m("Tokyo_Kodaira", "小平市"),
    m("Tokyo_Koganei", "小金井市"),
    m("Tokyo_Kokubunji", "国分寺市"),
    m("Tokyo_Komae", "狛江市"),
    m("Tokyo_Koto", "江東区"),
    m("Tokyo_Kunitachi", "国立市"),
    m("Tokyo_Machida", "町田市"),
    m("Tokyo_Meguro", "目黒区"),
    m("Tokyo_Minato", "港区"),
    m("Tokyo_Mitaka", "三鷹市"),
    m("Tokyo_Mizuho", "瑞穂町"),
    m("Tokyo_Musashimurayama", "武蔵村山市"),
    m("Tokyo_Musashino", "武蔵野市"),
    m("Tokyo_Nakano", "中野区"),
    m("Tokyo_NDL", "国立国会図書館"),
    m("Tokyo_Nerima", "練馬区"),
    m("Tokyo_Niijima", "新島村"),
    m("Tokyo_Nishitokyo", "西東京市"),
    m("Tokyo_Okutama", "奥多摩町"),
    m("Tokyo_Ome", "青梅市"),
    m("Tokyo_Ota", "大田区"),
    m("Tokyo_Setagaya", "世田谷区"),
    m("Tokyo_Shibuya", "渋谷区"),
    m("Tokyo_Shinagawa", "品川区"),
    m("Tokyo_Shinjuku", "新宿区"),
    m("Tokyo_Suginami", "杉並区"),
    m("Tokyo_Sumida", "墨田区"),
    m("Tokyo_Tachikawa", "立川市"),
    m("Tokyo_Taito", "台東区"),
    m("Tokyo_Tama", "多摩市"),
    m("Tokyo_Toshima", "豊島区"),
];

/// All supported library systems, ordered by code.
pub fn all() -> &'static [Municipality] {
    MUNICIPALITIES
}

/// Find a library system by its exact code.
pub fn find(code: &str) -> Option<&'static Municipality> {
    MUNICIPALITIES.iter().find(|m| m.code == code)
}

pub fn is_known(code: &str) -> bool {
    find(code).is_some()
}
